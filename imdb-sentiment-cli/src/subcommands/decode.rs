use std::io::{BufRead, BufWriter, Write};

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use imdb_sentiment::{indices_to_words, WordIndex};
use stdinout::{Input, Output};

use crate::traits::SentimentApp;

const INPUT: &str = "INPUT";
const LOSSY: &str = "LOSSY";
const OUTPUT: &str = "OUTPUT";
const WORD_INDEX: &str = "WORD_INDEX";

pub struct DecodeApp {
    input: Option<String>,
    lossy: bool,
    output: Option<String>,
    word_index: String,
}

impl DecodeApp {
    fn decode_line<'a>(&self, word_index: &'a WordIndex, line: &str) -> Result<Vec<&'a str>> {
        let indices = line
            .split_whitespace()
            .map(|idx| {
                idx.parse::<i64>()
                    .context(format!("Cannot parse index: {}", idx))
            })
            .collect::<Result<Vec<_>>>()?;

        if self.lossy {
            Ok(word_index.decode_lossy(&indices))
        } else {
            Ok(indices_to_words(word_index.reverse(), &indices)?)
        }
    }
}

impl SentimentApp for DecodeApp {
    fn app() -> Command {
        Command::new("decode")
            .arg_required_else_help(true)
            .about("Decode index sequences to words")
            .arg(
                Arg::new(WORD_INDEX)
                    .help("Word index in JSON format")
                    .index(1)
                    .required(true),
            )
            .arg(Arg::new(INPUT).help("Input sequences").index(2))
            .arg(Arg::new(OUTPUT).help("Output words").index(3).num_args(1))
            .arg(
                Arg::new(LOSSY)
                    .long("lossy")
                    .action(ArgAction::SetTrue)
                    .help("Render special and unknown indices as placeholders"),
            )
    }

    fn parse(matches: &ArgMatches) -> Result<Self> {
        let word_index = matches.get_one::<String>(WORD_INDEX).unwrap().to_owned();
        let input = matches.get_one::<String>(INPUT).map(ToOwned::to_owned);
        let output = matches.get_one::<String>(OUTPUT).map(ToOwned::to_owned);
        let lossy = matches.get_flag(LOSSY);

        Ok(DecodeApp {
            input,
            lossy,
            output,
            word_index,
        })
    }

    fn run(&self) -> Result<()> {
        let word_index = WordIndex::open(&self.word_index)
            .context(format!("Cannot read word index: {}", self.word_index))?;

        let input = Input::from(self.input.as_ref());
        let reader = input.buf_read().context("Cannot open input for reading")?;

        let output = Output::from(self.output.as_ref());
        let mut writer = BufWriter::new(output.write().context("Cannot open output for writing")?);

        for (line_idx, line) in reader.lines().enumerate() {
            let line = line.context("Cannot read line")?;
            let words = self
                .decode_line(&word_index, &line)
                .context(format!("Cannot decode line {}", line_idx + 1))?;
            writeln!(writer, "{}", words.join(" ")).context("Cannot write decoded words")?;
        }

        writer.flush().context("Cannot flush output")?;

        Ok(())
    }
}
