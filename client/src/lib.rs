use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::{Result, eyre::eyre};
use engine::Model;
use serde::{Serialize, de::DeserializeOwned};
use strum::IntoEnumIterator;

pub mod cli;
pub mod config;
pub mod frontend;
pub mod message;
pub mod session;
pub mod state;

use cli::{Cli, Command};
use config::ClientConfig;

const APP_NAME: &str = "Image Weaver";

const WELCOME: &str = indoc::indoc! {"
    Hi, since this is your first time starting Image Weaver, a default config was written.
    It expects the gateway at http://localhost:5000. Start it with the `gateway` binary
    after putting API_KEY into .env.local, or change gateway_url in the config file.
"};

pub async fn run(cli: Cli) -> Result<()> {
    let cfg = match load_config()? {
        Some(cfg) => cfg,
        None => {
            let cfg = ClientConfig::default();
            save_config(&cfg)?;
            eprintln!("{WELCOME}");
            cfg
        }
    }
    .merge_cli(&cli);

    match (cli.command, cli.prompt) {
        (Some(Command::Models), _) => {
            for model in Model::iter() {
                let marker = if model == cfg.default_model { " (default)" } else { "" };
                println!("{model}{marker}");
            }
            Ok(())
        }
        (Some(Command::SaveConfig), _) => {
            save_config(&cfg)?;
            println!("Saved to {}", config_path()?.display());
            Ok(())
        }
        (None, Some(prompt)) => frontend::run_once(&cfg, prompt).await,
        (None, None) => {
            println!("{APP_NAME}");
            frontend::run_interactive(&cfg).await
        }
    }
}

pub fn load_ron_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let src = fs::read_to_string(path)?;
    Ok(ron::from_str(&src)?)
}

pub fn save_ron_file<T: Serialize>(path: &Path, x: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    Ok(fs::write(path, ron::to_string(x)?)?)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(dirs::config_local_dir()
        .ok_or(eyre!("Couldn't get config dir"))?
        .join("image_weaver.ron"))
}

pub fn load_config() -> Result<Option<ClientConfig>> {
    let path = config_path()?;
    if !path.exists() {
        Ok(None)
    } else {
        load_ron_file(&path).map(Some)
    }
}

pub fn save_config(cfg: &ClientConfig) -> Result<()> {
    save_ron_file(&config_path()?, cfg)
}
