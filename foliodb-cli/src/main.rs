use clap::{Parser, Subcommand};
use foliodb::{Criterion, Database, TableStructure};
use serde_json::{Map, Value};
use std::process;

/// FolioDB CLI — interact with a FolioDB base directory from the command line
#[derive(Parser)]
#[command(name = "foliodb", version, about)]
struct Cli {
    /// Path to the database base directory (default: current directory)
    #[arg(long, default_value = ".")]
    data_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List tables
    Tables,

    /// Create a table
    Create {
        /// Table name
        table: String,
        /// Structure entries (e.g. --field name=string --field age=number)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Insert a record under the next auto-increment id
    Insert {
        /// Table name
        table: String,
        /// Field values (e.g. --field name=Alice --field age=30)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Get a single record by id
    Get {
        /// Table name
        table: String,
        /// Record id
        id: String,
    },

    /// Update an existing record
    Update {
        /// Table name
        table: String,
        /// Record id
        id: String,
        /// Field values to merge (e.g. --field age=31)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Delete a record by id
    Delete {
        /// Table name
        table: String,
        /// Record id
        id: String,
    },

    /// Filter, sort, and page through a table
    Query {
        /// Table name
        table: String,
        /// Criteria (e.g. --where "age >= 18" --where "name LIKE ali")
        #[arg(long = "where")]
        criteria: Vec<String>,
        /// Fields to project (e.g. --select name --select age)
        #[arg(long = "select")]
        select: Vec<String>,
        /// Sort keys (e.g. --order "age DESC")
        #[arg(long = "order")]
        order: Vec<String>,
        /// Maximum number of records to return
        #[arg(long)]
        limit: Option<usize>,
        /// Number of records to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Print only the record count
        #[arg(long)]
        count: bool,
    },

    /// Delete every record in a table, keeping its structure
    Truncate {
        /// Table name
        table: String,
    },

    /// Drop a table and its metadata
    Drop {
        /// Table name
        table: String,
    },

    /// Export the whole database to one JSON document
    Export {
        /// Output file path
        path: String,
    },

    /// Import a previously exported JSON document
    Import {
        /// Input file path
        path: String,
        /// Adopt the base directory recorded in the dump
        #[arg(long)]
        adopt_base: bool,
    },

    /// Show per-table counters
    Status,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// `--field age=30` should become a JSON number, `--field name=Alice` a
/// string. Anything that parses as JSON is taken as JSON; the rest stays a
/// plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn fields_to_map(fields: &[(String, String)]) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), parse_value(v)))
        .collect()
}

/// `"age >= 18"` → (`age`, `>=`, `18`). The value part may be any JSON
/// literal, so `"age IN [10,25]"` works too.
fn parse_criterion(spec: &str) -> Result<Criterion, Box<dyn std::error::Error>> {
    let mut parts = spec.splitn(3, char::is_whitespace);
    let (field, op, value) = match (parts.next(), parts.next(), parts.next()) {
        (Some(f), Some(op), Some(v)) => (f, op, v),
        _ => return Err(format!("Invalid criterion '{spec}': expected 'field op value'").into()),
    };
    Ok(Criterion::new(field, op, parse_value(value.trim()))?)
}

fn print_output(value: &Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open(&cli.data_dir)?;

    match cli.command {
        Command::Tables => {
            let tables = db.list_tables()?;
            print_output(&serde_json::json!(tables));
        }

        Command::Create { table, fields } => {
            let structure = TableStructure(fields.into_iter().collect());
            db.create_table(&table, structure)?;
            print_output(&serde_json::json!({ "ok": true, "table": table }));
        }

        Command::Insert { table, fields } => {
            let table = db.table(&table)?;
            let id = table.insert_auto(&fields_to_map(&fields))?;
            match id {
                Some(id) => print_output(&serde_json::json!({ "id": id })),
                None => print_output(&serde_json::json!({ "ok": false })),
            }
        }

        Command::Get { table, id } => {
            let table = db.table(&table)?;
            match table.find_by_id(&id)? {
                Some(record) => print_output(&record.to_value()),
                None => print_output(&serde_json::json!(null)),
            }
        }

        Command::Update { table, id, fields } => {
            let table = db.table(&table)?;
            table.update_by_id(&id, &fields_to_map(&fields))?;
            print_output(&serde_json::json!({ "ok": true, "id": id }));
        }

        Command::Delete { table, id } => {
            let table = db.table(&table)?;
            let deleted = table.delete_by_id(&id)?;
            print_output(&serde_json::json!({ "ok": deleted, "id": id }));
        }

        Command::Query {
            table,
            criteria,
            select,
            order,
            limit,
            offset,
            count,
        } => {
            let table = db.table(&table)?;
            let criteria = criteria
                .iter()
                .map(|spec| parse_criterion(spec))
                .collect::<Result<Vec<_>, _>>()?;

            let mut query = table.query();
            query.filter(&criteria)?;
            if !order.is_empty() {
                let specs: Vec<&str> = order.iter().map(String::as_str).collect();
                query.order_by(&specs);
            }
            if let Some(limit) = limit {
                query.limit(limit, offset);
            } else if offset > 0 {
                query.limit(usize::MAX, offset);
            }
            if !select.is_empty() {
                let fields: Vec<&str> = select.iter().map(String::as_str).collect();
                query.select(&fields)?;
            }

            if count {
                print_output(&serde_json::json!({ "count": query.count() }));
            } else {
                let records: Vec<Value> =
                    query.records().into_iter().map(Value::Object).collect();
                print_output(&serde_json::json!(records));
            }
        }

        Command::Truncate { table } => {
            let table = db.table(&table)?;
            table.truncate()?;
            print_output(&serde_json::json!({ "ok": true }));
        }

        Command::Drop { table } => {
            let dropped = db.drop_table(&table)?;
            print_output(&serde_json::json!({ "ok": dropped, "table": table }));
        }

        Command::Export { path } => {
            db.export(&path)?;
            print_output(&serde_json::json!({ "ok": true, "path": path }));
        }

        Command::Import { path, adopt_base } => {
            let imported = db.import(&path, adopt_base)?;
            print_output(&serde_json::json!({ "ok": imported, "path": path }));
        }

        Command::Status => {
            print_output(&db.status()?);
        }
    }

    Ok(())
}
