use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new(files: &[(&str, &str)]) -> Workspace {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let path = dir.path().join(path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        Workspace { dir }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("xmlpp").unwrap();
        cmd.current_dir(self.dir.path());
        cmd
    }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn output_to_stdout() {
    let workspace = Workspace::new(&[(
        "input.xml",
        "<?xml version=\"1.0\"?>\n<a>\n<?define X = 1?>$(var.X)</a>\n",
    )]);
    let output = workspace.command().arg("input.xml").output().unwrap();
    assert!(output.status.success());
    similar_asserts::assert_eq!(String::from_utf8(output.stdout).unwrap(), "<a>\n1</a>\n");
}

#[test]
fn output_to_file() {
    let workspace = Workspace::new(&[(
        "input.xml",
        "<a><?foreach v in 1;2?><i n=\"$(var.v)\"/><?endforeach?></a>",
    )]);
    workspace
        .command()
        .args(["input.xml", "output.xml"])
        .assert()
        .success()
        .stdout("");
    similar_asserts::assert_eq!(
        read(&workspace.path("output.xml")),
        "<a><i n=\"1\"/><i n=\"2\"/></a>"
    );
}

#[test]
fn defines() {
    let workspace = Workspace::new(&[("input.xml", "<a v=\"$(var.Version)\">$(var.Name)</a>")]);
    workspace
        .command()
        .args(["-d", "Version=1.2", "--define", "Name=a=b", "input.xml"])
        .assert()
        .success()
        .stdout("<a v=\"1.2\">a=b</a>\n");
}

#[test]
fn include_paths() {
    let workspace = Workspace::new(&[
        ("src/input.xml", "<a><?include common.xml?><?include local.xml?></a>"),
        ("src/local.xml", "<Include><local/></Include>"),
        ("lib/common.xml", "<Include><common/></Include>"),
    ]);
    workspace
        .command()
        .args(["-I", "lib", "src/input.xml"])
        .assert()
        .success()
        .stdout("<a><common/><local/></a>\n");
}

#[test]
fn architecture() {
    let workspace = Workspace::new(&[("input.xml", "<a>$(sys.BUILDARCH)</a>")]);
    workspace
        .command()
        .arg("input.xml")
        .assert()
        .success()
        .stdout("<a>x86</a>\n");
    workspace
        .command()
        .args(["--arch", "X64", "input.xml"])
        .assert()
        .success()
        .stdout("<a>x64</a>\n");
}

#[test]
fn invalid_architecture() {
    let workspace = Workspace::new(&[("input.xml", "<a/>")]);
    workspace
        .command()
        .args(["-a", "sparc", "input.xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sparc"));
}

#[test]
fn invalid_define() {
    let workspace = Workspace::new(&[("input.xml", "<a/>")]);
    workspace
        .command()
        .args(["-d", "Version", "input.xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NAME=VALUE"));
}

#[test]
fn missing_input() {
    let workspace = Workspace::new(&[]);
    workspace
        .command()
        .arg("missing.xml")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing.xml"));
}

#[test]
fn preprocessing_error() {
    let workspace = Workspace::new(&[("input.xml", "<a>\n  <?error the build is broken?>\n</a>")]);
    workspace
        .command()
        .args(["input.xml", "output.xml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("the build is broken"));
    assert!(!workspace.path("output.xml").exists());
}

#[test]
fn warnings_are_logged() {
    let workspace = Workspace::new(&[("input.xml", "<a><?warning check the version?></a>")]);
    workspace
        .command()
        .arg("input.xml")
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stderr(predicate::str::contains("check the version"));
}

#[test]
fn output_must_have_single_root() {
    let workspace = Workspace::new(&[(
        "input.xml",
        "<?foreach v in A;B?><Item>$(var.v)</Item><?endforeach?>",
    )]);
    workspace
        .command()
        .arg("input.xml")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("root elements"));
    workspace
        .command()
        .args(["--fragment", "input.xml"])
        .assert()
        .success()
        .stdout("<Item>A</Item><Item>B</Item>\n");
}

#[test]
fn relative_include_path() {
    let workspace = Workspace::new(&[
        ("input.xml", "<a><?include x.xml?></a>"),
        ("lib/x.xml", "<Include><x/></Include>"),
    ]);
    workspace
        .command()
        .args(["--include-path", "lib", "input.xml"])
        .env("RUST_LOG", "xmlpp=debug")
        .assert()
        .success()
        .stdout("<a><x/></a>\n")
        .stderr(predicate::str::contains(
            workspace
                .path("lib")
                .canonicalize()
                .unwrap()
                .join("x.xml")
                .display()
                .to_string(),
        ));
}
