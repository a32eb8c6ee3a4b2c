use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use clap::Parser;
use unfollow_db::Bucket;

/// Track who started and stopped following an account
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Opts {
    /// Configuration file with API credentials
    #[arg(long, env = "UNFOLLOW_CONF", default_value = "conf.json")]
    pub conf: PathBuf,

    /// Database file to keep follower state in
    #[arg(long, env = "UNFOLLOW_DB")]
    pub db: Option<PathBuf>,

    /// Keep a copy of every raw follower page in this directory
    #[arg(long, env = "UNFOLLOW_DUMP_DIR")]
    pub dump_dir: Option<PathBuf>,

    /// Print the stored active followers and exit
    #[arg(long, conflicts_with = "grave")]
    pub read: bool,

    /// Print the stored departed followers and exit
    #[arg(long)]
    pub grave: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Reconcile,
    Dump(Bucket),
}

static PROJECT_DIRS: LazyLock<Option<directories::ProjectDirs>> =
    LazyLock::new(|| directories::ProjectDirs::from("org", "Unfollow", "unfollow"));

const DB_FILE_NAME: &str = "unfollow.redb";

impl Opts {
    pub fn mode(&self) -> Mode {
        if self.read {
            Mode::Dump(Bucket::Active)
        } else if self.grave {
            Mode::Dump(Bucket::Graveyard)
        } else {
            Mode::Reconcile
        }
    }

    /// `--db` if given, otherwise a file in the user's state dir (or the
    /// working directory if there is none).
    pub fn db_path(&self) -> PathBuf {
        if let Some(path) = &self.db {
            return path.clone();
        }

        let dir = PROJECT_DIRS
            .as_ref()
            .map(|dirs| dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir()))
            .unwrap_or_else(|| Path::new("."));
        dir.join(DB_FILE_NAME)
    }
}
