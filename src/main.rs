use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ephe::properties::HipsProperties;
use ephe::tile::EncodeOptions;
use ephe::value::record_from_json;
use ephe::{read_tile, Nuniq, Record, Schema, TileStore, Unit};

#[derive(Parser)]
#[command(name = "ephe", about = "Encode and inspect .eph survey tiles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode JSON-lines records into one tile
    Pack {
        /// JSON column schema
        #[arg(short, long)]
        schema: PathBuf,
        /// JSON-lines records, one object per line ("-" for stdin)
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        nuniq: u64,
        /// 4-letter chunk type, uppercase first letter
        #[arg(short, long, default_value = "STAR")]
        chunk_type: String,
        /// zlib compression level (0-9)
        #[arg(short, long, default_value = "9")]
        level: u32,
        /// Survey root directory
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the records of a tile as JSON lines
    Dump {
        input: PathBuf,
        /// Convert a float column, e.g. `ra=deg` (repeatable)
        #[arg(short, long = "unit", value_parser = parse_unit)]
        units: Vec<(String, Unit)>,
    },
    /// Show tile header and columns
    Info {
        input: PathBuf,
    },
    /// Print order, pixel and path of a nuniq
    Path {
        #[arg(short, long)]
        nuniq: u64,
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },
    /// List the tiles of a survey directory
    List {
        root: PathBuf,
    },
    /// Write the survey properties file
    Properties {
        #[arg(short, long)]
        output: PathBuf,
        /// Survey type, e.g. stars
        #[arg(short = 't', long = "type", default_value = "stars")]
        survey_type: String,
        /// Overrides the shallowest order found in the survey
        #[arg(long)]
        order_min: Option<u32>,
        /// Overrides the deepest order found in the survey
        #[arg(long)]
        order_max: Option<u32>,
        #[arg(long)]
        max_vmag: Option<f32>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match Cli::parse().command {

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { schema, input, nuniq, chunk_type, level, output } => {
            let schema = Schema::load(&schema)?;
            let records = read_records(&schema, &input)?;
            let store = TileStore::with_options(&output, EncodeOptions { level });
            let path = store.write(&chunk_type, nuniq, &schema, &records)?;
            println!("  packed  {} rows → {}", records.len(), path.display());
        }

        // ── Dump ─────────────────────────────────────────────────────────────
        Commands::Dump { input, units } => {
            let tile = read_tile(&input)?;
            let columns = tile
                .columns
                .iter()
                .map(|c| {
                    let unit = units
                        .iter()
                        .find(|(id, _)| *id == c.id)
                        .map_or(Unit::NONE, |&(_, u)| u);
                    tile.column(&c.id, c.ty, unit)
                })
                .collect::<Result<Vec<_>, _>>()?;

            let stdout = io::stdout();
            let mut out = stdout.lock();
            for row in 0..tile.records.len() {
                let obj: serde_json::Map<_, _> = tile
                    .columns
                    .iter()
                    .zip(&columns)
                    .map(|(c, values)| (c.id.clone(), values[row].to_json()))
                    .collect();
                writeln!(out, "{}", serde_json::Value::Object(obj))?;
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let tile = read_tile(&input)?;
            let h = &tile.header;
            let raw = h.row_size as usize * h.row_count as usize;
            println!("── .eph Tile ────────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Chunk type     {}", tile.chunk_type_str());
            println!("  Chunk version  {}", h.chunk_version);
            match tile.nuniq() {
                Ok(n)  => println!("  Nuniq          {n}"),
                Err(_) => println!("  Nuniq          {} (invalid)", h.nuniq),
            }
            println!("  Shuffled       {}", h.is_shuffled());
            println!("  Rows           {}", h.row_count);
            println!("  Row size       {} B", h.row_size);
            println!("  Payload        {} B → {} B", raw, tile.compressed_size);
            println!("  Columns ({}):", tile.columns.len());
            for c in &tile.columns {
                println!("    {:<4} {:<10} offset {:>3}  size {:>3}  unit {}",
                    c.id, c.ty.to_string(), c.offset, c.size, c.unit);
            }
        }

        // ── Path ─────────────────────────────────────────────────────────────
        Commands::Path { nuniq, root } => {
            let n = Nuniq::new(nuniq)?;
            println!("order {}  pix {}  {}", n.order(), n.pix(), n.tile_path(&root).display());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { root } => {
            let store = TileStore::open(&root);
            for key in store.list()? {
                println!("{:>12}  {}", key.get(), store.path(key.get())?.display());
            }
        }

        // ── Properties ───────────────────────────────────────────────────────
        Commands::Properties { output, survey_type, order_min, order_max, max_vmag } => {
            let store = TileStore::open(&output);
            let mut props = store.describe(HipsProperties::new(survey_type))?;
            if let Some(o) = order_min {
                props.order_min = o;
            }
            if order_max.is_some() {
                props.order_max = order_max;
            }
            props.max_vmag = max_vmag;
            let path = props.write_to(store.root())?;
            println!("Created: {}", path.display());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn parse_unit(s: &str) -> Result<(String, Unit), String> {
    let (id, name) = s
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=UNIT, got {s:?}"))?;
    let unit = Unit::from_name(name).ok_or_else(|| format!("unknown unit {name:?}"))?;
    Ok((id.to_owned(), unit))
}

fn read_records(schema: &Schema, input: &PathBuf) -> Result<Vec<Record>, Box<dyn std::error::Error>> {
    let reader: Box<dyn BufRead> = if input.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(input)?))
    };
    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let json: serde_json::Value = serde_json::from_str(&line)
            .map_err(|e| format!("{}:{}: {e}", input.display(), lineno + 1))?;
        records.push(record_from_json(schema.columns(), &json)?);
    }
    Ok(records)
}
