use super::{argument_error, emit};
use crate::cli::{TemplateArgs, TemplateCommands};
use crate::error::Result;
use crate::utils::parser::parse_substitutions;
use chemflow::core::template::Template;
use chemflow::core::template::library::{bundled_template, bundled_text, list_templates};
use chemflow::db::repo::{RepoError, SqliteTemplateRepository, TemplateRepository};
use chemflow::db::{open_db, open_existing_db};
use std::path::Path;

pub fn run(args: TemplateArgs) -> Result<()> {
    let db = args.db.path;
    match args.command {
        TemplateCommands::List => handle_list(&db),
        TemplateCommands::Show { name } => {
            print!("{}", load_template(&db, &name)?.text());
            Ok(())
        }
        TemplateCommands::Keys { name } => {
            for key in load_template(&db, &name)?.named_keys() {
                println!("{key}");
            }
            Ok(())
        }
        TemplateCommands::Render {
            name,
            values,
            safe,
            output,
        } => {
            let template = load_template(&db, &name)?;
            let values = parse_substitutions(&values).map_err(argument_error)?;
            let text = if safe {
                template.safe_substitute(&values)
            } else {
                template.render_script(&values)?
            };
            emit(&text, output.as_deref())
        }
        TemplateCommands::Add { name, file } => {
            let text = match &file {
                Some(path) => std::fs::read_to_string(path)?,
                None => bundled_text(&name)?.to_string(),
            };
            let conn = open_db(&db)?;
            let id = SqliteTemplateRepository::new(&conn).create_template(&name, &text)?;
            println!("Stored template '{name}' with id {id}");
            Ok(())
        }
    }
}

/// Looks a template up in the database first and falls back to the bundled
/// library.
pub(crate) fn load_template(db: &Path, name: &str) -> Result<Template> {
    if db.exists() {
        let conn = open_existing_db(db)?;
        match SqliteTemplateRepository::new(&conn).find_template_by_name(name) {
            Ok(record) => return Ok(record.to_template()),
            Err(RepoError::NotFound { .. }) => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(bundled_template(name)?)
}

fn handle_list(db: &Path) -> Result<()> {
    println!("Bundled templates:");
    for name in list_templates() {
        println!("  {name}");
    }
    if db.exists() {
        let conn = open_existing_db(db)?;
        let stored = SqliteTemplateRepository::new(&conn).list_templates()?;
        println!("Templates in {}:", db.display());
        for record in stored {
            println!("  {:>4}  {}", record.id, record.name);
        }
    }
    Ok(())
}
