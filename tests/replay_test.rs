use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

#[test]
fn test_replay_fixture() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("wallet-ledger"));
    cmd.arg("replay").arg("tests/fixtures/operations.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("wallet,id,balance"))
        .stdout(predicate::str::is_match(r"alice,[0-9a-f-]{36},3000")?)
        // bob's withdrawal of 500 exceeds every reachable balance
        .stdout(predicate::str::is_match(r"bob,[0-9a-f-]{36},300")?)
        .stdout(predicate::str::is_match(r"carol,[0-9a-f-]{36},42")?)
        .stderr(predicate::str::contains("applied=4 rejected=1 failed=0"));

    Ok(())
}

#[test]
fn test_replay_skips_malformed_rows() {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "wallet, kind, amount").unwrap();
    writeln!(csv, "alice, DEPOSIT, 100").unwrap();
    writeln!(csv, "alice, DEPOSIT, lots").unwrap();
    writeln!(csv, "alice, DEPOSIT, 20").unwrap();

    let mut cmd = Command::new(cargo_bin!("wallet-ledger"));
    cmd.arg("replay").arg(csv.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::is_match(r"alice,[0-9a-f-]{36},120").unwrap())
        .stderr(predicate::str::contains("Error reading operation"));
}

#[test]
fn test_replay_missing_file() {
    let mut cmd = Command::new(cargo_bin!("wallet-ledger"));
    cmd.arg("replay").arg("tests/fixtures/does_not_exist.csv");

    cmd.assert().failure();
}
