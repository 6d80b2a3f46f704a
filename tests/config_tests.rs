use std::env;
use std::fs;
use std::path::PathBuf;

use encyphrix::config::app_config::{ConfigError, CoreConfig};
use serial_test::serial;
use tempfile::tempdir;

const ENV_KEYS: &[&str] = &[
    "ENCYPHRIX_OPSLIMIT",
    "ENCYPHRIX_MEMLIMIT_MIB",
    "ENCYPHRIX_PAD_BLOCK",
    "ENCYPHRIX_STORAGE_SLOT",
    "ENCYPHRIX_AUTO_LOCK_SECS",
    "ENCYPHRIX_CONFIG_DIR",
];

fn clear_env() {
    for key in ENV_KEYS {
        env::remove_var(key);
    }
}

fn isolate_config_dir(dir: &tempfile::TempDir) {
    env::set_var(
        "ENCYPHRIX_CONFIG_DIR",
        dir.path().to_string_lossy().to_string(),
    );
}

fn write_config_file(content: &str) {
    let base = env::var("ENCYPHRIX_CONFIG_DIR").expect("config dir isolated");
    let dir = PathBuf::from(base).join("encyphrix");
    fs::create_dir_all(&dir).expect("create config dir");
    fs::write(dir.join("config.toml"), content).expect("write config file");
}

#[test]
#[serial]
fn defaults_when_nothing_is_configured() {
    clear_env();
    let td = tempdir().unwrap();
    isolate_config_dir(&td);

    let cfg = CoreConfig::create().unwrap();
    assert_eq!(cfg.kdf.opslimit, 3);
    assert_eq!(cfg.kdf.memlimit, 256 * 1024 * 1024);
    assert_eq!(cfg.pad_block, 256);
    assert_eq!(cfg.storage_slot, "encyphrix.vault.v1");
    assert_eq!(cfg.auto_lock_secs, None);
}

#[test]
#[serial]
fn config_file_values_apply() {
    clear_env();
    let td = tempdir().unwrap();
    isolate_config_dir(&td);
    write_config_file(
        "opslimit = 2\nmemlimit_mib = 16\npad_block = 128\nstorage_slot = \"custom.slot\"\nauto_lock_secs = 60\n",
    );

    let cfg = CoreConfig::create().unwrap();
    assert_eq!(cfg.kdf.opslimit, 2);
    assert_eq!(cfg.kdf.memlimit, 16 * 1024 * 1024);
    assert_eq!(cfg.pad_block, 128);
    assert_eq!(cfg.storage_slot, "custom.slot");
    assert_eq!(cfg.auto_lock_secs, Some(60));
}

#[test]
#[serial]
fn env_overrides_config_file() {
    clear_env();
    let td = tempdir().unwrap();
    isolate_config_dir(&td);
    write_config_file("pad_block = 128\nstorage_slot = \"file.slot\"\n");

    env::set_var("ENCYPHRIX_PAD_BLOCK", "512");
    env::set_var("ENCYPHRIX_STORAGE_SLOT", "env.slot");
    let cfg = CoreConfig::create().unwrap();
    assert_eq!(cfg.pad_block, 512);
    assert_eq!(cfg.storage_slot, "env.slot");
    clear_env();
}

#[test]
#[serial]
fn pad_block_out_of_range_is_rejected() {
    clear_env();
    let td = tempdir().unwrap();
    isolate_config_dir(&td);

    env::set_var("ENCYPHRIX_PAD_BLOCK", "8");
    assert!(matches!(
        CoreConfig::create(),
        Err(ConfigError::InvalidPadBlock)
    ));

    env::set_var("ENCYPHRIX_PAD_BLOCK", "5000");
    assert!(matches!(
        CoreConfig::create(),
        Err(ConfigError::InvalidPadBlock)
    ));
    clear_env();
}

#[test]
#[serial]
fn kdf_override_below_minimum_is_rejected() {
    clear_env();
    let td = tempdir().unwrap();
    isolate_config_dir(&td);

    env::set_var("ENCYPHRIX_MEMLIMIT_MIB", "4");
    assert!(matches!(
        CoreConfig::create(),
        Err(ConfigError::InvalidKdf(_))
    ));
    clear_env();
}

#[test]
#[serial]
fn auto_lock_zero_means_never() {
    clear_env();
    let td = tempdir().unwrap();
    isolate_config_dir(&td);

    env::set_var("ENCYPHRIX_AUTO_LOCK_SECS", "0");
    let cfg = CoreConfig::create().unwrap();
    assert_eq!(cfg.auto_lock_secs, None);
    clear_env();
}

#[test]
#[serial]
fn partial_kdf_override_keeps_the_other_default() {
    clear_env();
    let td = tempdir().unwrap();
    isolate_config_dir(&td);

    env::set_var("ENCYPHRIX_OPSLIMIT", "5");
    let cfg = CoreConfig::create().unwrap();
    assert_eq!(cfg.kdf.opslimit, 5);
    assert_eq!(cfg.kdf.memlimit, 256 * 1024 * 1024);
    clear_env();
}
