mod load;
mod types;

pub use load::{apply_env_overrides, get_data_dir, load_default, load_from_file};
pub use types::{
    AppConfig, ClientConfig, DownloadsConfig, HttpServerConfig, LoggingConfig, TasksConfig,
};
