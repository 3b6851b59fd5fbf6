#![cfg(feature = "cli")]
//! Integration tests for `idbx completions`.

use clap::CommandFactory;
use idb::cli::app::Cli;

fn generate_completions(shell: clap_complete::Shell) -> String {
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, "idbx", &mut buf);
    String::from_utf8(buf).expect("completions should be valid UTF-8")
}

#[test]
fn bash_completions_contain_subcommands() {
    let output = generate_completions(clap_complete::Shell::Bash);
    assert!(output.contains("idbx"));
    assert!(output.contains("scan"));
    assert!(output.contains("check-order"));
    assert!(output.contains("completions"));
}

#[test]
fn zsh_completions_are_valid() {
    let output = generate_completions(clap_complete::Shell::Zsh);
    assert!(output.contains("idbx"));
    assert!(output.contains("--int-order"));
}

#[test]
fn fish_completions_are_valid() {
    let output = generate_completions(clap_complete::Shell::Fish);
    assert!(output.contains("idbx"));
}

#[test]
fn powershell_completions_are_valid() {
    let output = generate_completions(clap_complete::Shell::PowerShell);
    assert!(output.contains("idbx"));
}
