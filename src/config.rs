use std::path::PathBuf;

use anyhow::{bail, Context};

#[derive(Clone, Debug)]
pub enum StorageConfig {
    Fs { root: PathBuf },
    S3 {
        bucket: String,
        endpoint: String,
        region: String,
        access_key: Option<String>,
        secret_key: Option<String>,
    },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub frontend_url: String,
    pub database_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub storage: StorageConfig,
}

pub const MIN_JWT_SECRET_LEN: usize = 32;

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        match non_empty("JWT_SECRET") {
            None => bail!("JWT_SECRET must be set (copy .env.example to .env)"),
            Some(s) if s.len() < MIN_JWT_SECRET_LEN => {
                bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} characters long")
            }
            Some(_) => {}
        }

        let storage = match non_empty("STORAGE_BACKEND").as_deref().unwrap_or("fs") {
            "fs" => StorageConfig::Fs {
                root: non_empty("STORAGE_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("data/blobs")),
            },
            "s3" => StorageConfig::S3 {
                bucket: non_empty("S3_BUCKET").unwrap_or_else(|| "showcase-media".into()),
                endpoint: non_empty("S3_ENDPOINT")
                    .context("S3_ENDPOINT must be set when STORAGE_BACKEND=s3")?,
                region: non_empty("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
                access_key: non_empty("S3_ACCESS_KEY"),
                secret_key: non_empty("S3_SECRET_KEY"),
            },
            other => bail!("unknown STORAGE_BACKEND '{other}' (expected fs or s3)"),
        };

        let database_url = non_empty("DATABASE_URL");
        if cfg!(feature = "postgres-store") && database_url.is_none() {
            bail!("DATABASE_URL must be set for postgres-store");
        }

        Ok(Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            frontend_url: non_empty("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:5173".into()),
            database_url,
            data_dir: non_empty("SHOWCASE_DATA_DIR").map(PathBuf::from),
            storage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: &[&str] = &["JWT_SECRET", "STORAGE_BACKEND", "STORAGE_ROOT", "S3_ENDPOINT", "BIND_ADDR"];

    fn reset() {
        for v in VARS {
            std::env::remove_var(v);
        }
    }

    #[test]
    #[serial_test::serial]
    fn from_env_defaults_and_validation() {
        reset();
        assert!(AppConfig::from_env().is_err());

        std::env::set_var("JWT_SECRET", "short");
        assert!(AppConfig::from_env().is_err());

        std::env::set_var("JWT_SECRET", "0123456789abcdef0123456789abcdef");
        if !cfg!(feature = "postgres-store") {
            let cfg = AppConfig::from_env().unwrap();
            assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
            assert!(matches!(cfg.storage, StorageConfig::Fs { ref root } if root == &PathBuf::from("data/blobs")));
        }

        std::env::set_var("STORAGE_BACKEND", "s3");
        assert!(AppConfig::from_env().is_err(), "s3 without endpoint");

        std::env::set_var("STORAGE_BACKEND", "ftp");
        assert!(AppConfig::from_env().is_err());
        reset();
    }
}
