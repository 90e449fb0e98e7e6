use std::path::PathBuf;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, settings_file_exists, shellexpand_path};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        let expanded = PathBuf::from(shellexpand_path(&dir));
        std::fs::create_dir_all(&expanded)?;
        settings.data_dir = std::fs::canonicalize(&expanded)?.to_string_lossy().to_string();
    } else {
        std::fs::create_dir_all(&settings.data_dir)?;
    }

    let db_path = settings.db_path();
    let existed = db_path.exists();
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;

    let first_run = !settings_file_exists();
    save_settings(&settings)?;

    if existed {
        println!("Database up to date at {}", db_path.display());
    } else {
        println!("Initialized shaft at {}", db_path.display());
    }
    if first_run {
        println!("Settings written. Currency: {}", settings.currency);
    }
    Ok(())
}
