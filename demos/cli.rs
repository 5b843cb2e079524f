use std::error;
use std::io;
use std::process;

use bibdoc::{Document, Policy};

use clap::Parser as CLIParser;
use tracing_subscriber::EnvFilter;

#[derive(clap::Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Settings {
    /// Filepath to file to parse
    #[clap(short, long)]
    input: String,

    /// Return only entries with this key
    #[clap(short, long)]
    query_id: Option<String>,

    /// Keep valid entries of a file with malformed ones
    #[clap(long)]
    ignore_errors: bool,

    /// Write the entries back as canonical BibTeχ
    #[clap(long)]
    canonical: bool,

    /// Print entries as JSON (needs the `serde` feature)
    #[clap(long)]
    json: bool,
}

fn print_human_readable(s: &Settings, doc: &Document) {
    for entry in doc {
        if let Some(query) = &s.query_id {
            if query != entry.key() {
                continue;
            }
        }
        println!("type = {}", entry.type_name());
        println!("key = {}", entry.key());
        for (name, data) in entry.fields().iter() {
            println!("\t{}\t= {}", name, data);
        }
    }
}

fn print_canonical(s: &Settings, doc: &Document) -> Result<(), Box<dyn error::Error>> {
    let mut selected = Document::new(doc.policy());
    for entry in doc {
        if s.query_id.as_deref().map_or(true, |query| query == entry.key()) {
            selected.add(entry.clone());
        }
    }
    selected.save(io::stdout().lock())?;
    Ok(())
}

#[cfg(feature = "serde")]
fn print_json(s: &Settings, doc: &Document) -> Result<(), Box<dyn error::Error>> {
    use serde::Serialize;

    #[derive(Serialize)]
    struct Entries<'d> {
        data: Vec<&'d bibdoc::Entry>,
        symbols: &'d bibdoc::SymbolTable,
        diagnostics: &'d [bibdoc::ParseError],
    }

    let data = doc
        .iter()
        .filter(|entry| s.query_id.as_deref().map_or(true, |query| query == entry.key()))
        .collect();
    let entries = Entries {
        data,
        symbols: doc.symbols(),
        diagnostics: doc.diagnostics(),
    };
    println!("{}", serde_json::to_string(&entries)?);

    Ok(())
}

fn main() -> Result<(), Box<dyn error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let settings = Settings::parse();
    let policy = if settings.ignore_errors {
        Policy::IgnoreParseErrors
    } else {
        Policy::StopOnFirstError
    };

    let mut doc = Document::new(policy);
    let clean = doc.load_file(&settings.input)?;
    for err in doc.diagnostics() {
        eprintln!("{}: {}", settings.input, err);
    }
    if !clean && policy == Policy::StopOnFirstError {
        process::exit(1);
    }

    if settings.json {
        #[cfg(feature = "serde")]
        return print_json(&settings, &doc);
        #[cfg(not(feature = "serde"))]
        return Err("built without the `serde` feature".into());
    }
    if settings.canonical {
        print_canonical(&settings, &doc)?;
    } else {
        print_human_readable(&settings, &doc);
    }

    Ok(())
}
