use anyhow::Result;
use ovpn_instances::core::manager::MenuOutcome;
use ovpn_instances::{
    Console, DefaultAllocator, Instance, InstanceManager, NetworkMatch, OvpnError, Protocol,
    Registry, ScriptInstaller,
};
use std::io::Cursor;
use std::net::Ipv4Addr;
use tempfile::TempDir;

/// 以真實 shell script 當作安裝程式，記錄收到的參數
fn recording_installer(temp_dir: &TempDir) -> Result<(ScriptInstaller, std::path::PathBuf)> {
    let log = temp_dir.path().join("installer.log");
    let script = temp_dir.path().join("install.sh");
    std::fs::write(&script, format!("echo \"$@\" >> '{}'\n", log.display()))?;
    Ok((ScriptInstaller::new("/bin/sh", &script), log))
}

fn manager(
    temp_dir: &TempDir,
    input: &str,
    installer: ScriptInstaller,
) -> InstanceManager<Console<Cursor<String>, Vec<u8>>, ScriptInstaller> {
    InstanceManager::new(
        Registry::new(temp_dir.path().join("instances")),
        DefaultAllocator::default(),
        NetworkMatch::Exact,
        Console::new(Cursor::new(input.to_string()), Vec::new()),
        installer,
    )
}

#[test]
fn test_first_run_creates_registry_and_installs() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (installer, log) = recording_installer(&temp_dir)?;
    let mut manager = manager(&temp_dir, "\n2\n\n\n", installer);

    let outcome = manager.run_menu()?;
    let expected = Instance::new("inst0", 1194, Protocol::Tcp, Ipv4Addr::new(10, 0, 0, 0));
    assert_eq!(outcome, MenuOutcome::Created(expected.clone()));

    let content = std::fs::read_to_string(temp_dir.path().join("instances"))?;
    assert_eq!(
        content,
        "# Created by ovpn-instances, DO NOT EDIT!\n# Instance Name;Port;Protocol;Network\ninst0;1194;tcp;10.0.0.0\n"
    );
    assert_eq!(std::fs::read_to_string(log)?, "inst0 1194 tcp 10.0.0.0\n");
    Ok(())
}

#[test]
fn test_second_run_offers_next_defaults() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (installer, log) = recording_installer(&temp_dir)?;

    manager(&temp_dir, "\n\n\n\n", installer.clone()).run_menu()?;

    let mut second = manager(&temp_dir, "2\n\n\n\n\n", installer);
    let outcome = second.run_menu()?;
    assert_eq!(
        outcome,
        MenuOutcome::Created(Instance::new(
            "inst1",
            1195,
            Protocol::Udp,
            Ipv4Addr::new(10, 0, 1, 0)
        ))
    );

    let output = String::from_utf8(second.into_prompter().into_output())?;
    assert!(output.contains("Current instances:"));
    assert!(output.contains("openvpn-server-multi@server-inst0.service"));
    assert!(output.contains("[inst1]"));
    assert!(output.contains("Port [1195]"));
    assert!(output.contains("[10.0.1.0]"));

    assert_eq!(
        std::fs::read_to_string(log)?,
        "inst0 1194 udp 10.0.0.0\ninst1 1195 udp 10.0.1.0\n"
    );
    Ok(())
}

#[test]
fn test_installer_failure_keeps_registry_entry() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let script = temp_dir.path().join("fail.sh");
    std::fs::write(&script, "exit 1\n")?;
    let mut manager = manager(
        &temp_dir,
        "",
        ScriptInstaller::new("/bin/sh", &script),
    );

    let err = manager
        .add("inst0", 1194, "udp", "10.0.0.0")
        .unwrap_err();
    assert!(matches!(err, OvpnError::InstallerFailed { .. }));
    assert_eq!(manager.list()?.len(), 1);
    Ok(())
}

#[test]
fn test_concurrent_append_is_detected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (installer, _log) = recording_installer(&temp_dir)?;
    let registry = Registry::new(temp_dir.path().join("instances"));

    // 模擬另一個行程在填寫期間寫入了 10.0.0.0
    let other = Instance::new("other", 1300, Protocol::Udp, Ipv4Addr::new(10, 0, 0, 0));
    registry.append(&other)?;
    let candidate = Instance::new("inst0", 1194, Protocol::Udp, Ipv4Addr::new(10, 0, 0, 0));
    let err = registry
        .append_checked(&candidate, NetworkMatch::Exact)
        .unwrap_err();
    assert!(matches!(err, OvpnError::Conflict { .. }));

    let mut manager = manager(&temp_dir, "2\n\n\n\n\n", installer);
    let outcome = manager.run_menu()?;
    assert_eq!(
        outcome,
        MenuOutcome::Created(Instance::new(
            "inst0",
            1194,
            Protocol::Udp,
            Ipv4Addr::new(10, 0, 1, 0)
        ))
    );
    Ok(())
}
