use confclient::config::ClientConfig;
use tempfile::TempDir;

#[test]
fn test_missing_file_writes_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("confclient.conf");
    let path = path.to_str().unwrap();

    let config = ClientConfig::load_from_file(path).unwrap();
    assert_eq!(config, ClientConfig::default());

    // the default file was created and parses back to the same config
    let reloaded = ClientConfig::load_from_file(path).unwrap();
    assert_eq!(reloaded, config);
}

#[test]
fn test_load_custom_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("confclient.conf");

    std::fs::write(
        &path,
        r#"
# test device
[device]
address = "10.1.2.3"
port = 2323

[auth]
user = "operator"
password = "hunter2"

[timeouts]
open = 10000

[output]
use_colors = false
"#,
    )
    .unwrap();

    let config = ClientConfig::load_from_file(path.to_str().unwrap()).unwrap();

    assert_eq!(config.device.address, "10.1.2.3");
    assert_eq!(config.device.port, 2323);
    assert_eq!(config.auth.user, "operator");
    assert_eq!(config.auth.password, "hunter2");
    assert_eq!(config.timeouts.open, 10000);
    assert_eq!(config.timeouts.send, 5000);
    assert!(!config.output.use_colors);
}

#[test]
fn test_bad_file_reports_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("confclient.conf");

    std::fs::write(&path, "[device]\nport = not-a-port\n").unwrap();

    assert!(ClientConfig::load_from_file(path.to_str().unwrap()).is_err());
}
