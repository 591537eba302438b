use super::argument_error;
use crate::cli::{CalcArgs, CalcCommands};
use crate::error::Result;
use crate::utils::parser::parse_properties;
use chemflow::db::models::{CalculatorRecord, NewCalculator};
use chemflow::db::repo::{CalculatorRepository, SqliteCalculatorRepository};
use chemflow::db::{open_db, open_existing_db};
use std::fmt::Write as _;

pub fn run(args: CalcArgs) -> Result<()> {
    match args.command {
        CalcCommands::Add {
            name,
            version,
            description,
            attributes,
        } => {
            let calculator = NewCalculator {
                name,
                version,
                description,
                attributes: parse_properties(&attributes).map_err(argument_error)?,
            };
            let conn = open_db(&args.db.path)?;
            let id = SqliteCalculatorRepository::new(&conn).create_calculator(&calculator)?;
            println!(
                "Stored calculator '{}' with {} attribute(s) as id {id}",
                calculator.name,
                calculator.attributes.len()
            );
            Ok(())
        }
        CalcCommands::Show { name } => {
            let conn = open_existing_db(&args.db.path)?;
            let calculator = SqliteCalculatorRepository::new(&conn).find_calculator_by_name(&name)?;
            print!("{}", describe(&calculator));
            Ok(())
        }
    }
}

fn describe(calculator: &CalculatorRecord) -> String {
    let mut out = format!("{} (id {})\n", calculator.name, calculator.id);
    if let Some(version) = &calculator.version {
        let _ = writeln!(out, "version: {version}");
    }
    if let Some(description) = &calculator.description {
        let _ = writeln!(out, "description: {description}");
    }
    for (key, value) in &calculator.attributes {
        let _ = writeln!(out, "  {key} = {value} ({})", value.kind());
    }
    out
}
