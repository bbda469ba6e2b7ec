//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

use std::fs;
use std::path::Path;

use assert_cmd::Command;

use crate::common::PNG;

fn webscrap(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.current_dir(dir)
        .env_remove("WEBSCRAP_CONFIG")
        .env_remove("WEBSCRAP_CONTAINER")
        .env_remove("WEBSCRAP_MAX_DEPTH")
        .env("NO_COLOR", "1");
    cmd
}

fn write_site(dir: &Path) {
    fs::write(
        dir.join("page.html"),
        r#"<html><head><title>Local page</title><link rel="stylesheet" href="style.css"></head>
        <body><img src="pic.png"><script>alert(1)</script></body></html>"#,
    )
    .unwrap();
    fs::write(dir.join("style.css"), "body { color: teal }").unwrap();
    fs::write(dir.join("pic.png"), PNG).unwrap();
}

#[cfg(test)]
mod passing {
    use super::*;

    #[test]
    fn print_help_information() {
        let dir = tempfile::tempdir().unwrap();
        let out = webscrap(dir.path()).arg("--help").assert().success();
        let stdout = String::from_utf8_lossy(&out.get_output().stdout).to_string();

        assert!(stdout.contains("Capture a web page and its resources into an offline archive"));
        assert!(stdout.contains("--css-mode"));
        assert!(stdout.contains("Environment variables:"));
        assert!(stdout.contains("WEBSCRAP_MAX_DEPTH"));
    }

    #[test]
    fn local_page_to_single_html() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());

        webscrap(dir.path())
            .args(["page.html", "-f", "single-html", "-o", "out.html", "-s"])
            .assert()
            .success();

        let html = fs::read_to_string(dir.path().join("out.html")).unwrap();
        assert!(html.contains("data:text/css;charset=utf-8;filename=style.css,"));
        assert!(html.contains("data:image/png;filename=pic.png;base64,"));
        assert!(!html.contains("alert(1)"));
    }

    #[test]
    fn title_names_the_output() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());

        webscrap(dir.path())
            .args(["page.html", "-f", "zip", "-s"])
            .assert()
            .success();

        assert!(dir.path().join("Local page.htz").is_file());
    }

    #[test]
    fn stdout_output() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());

        let out = webscrap(dir.path())
            .args(["page.html", "-f", "single-html", "-o", "-", "-s"])
            .assert()
            .success();
        let stdout = String::from_utf8_lossy(&out.get_output().stdout).to_string();

        assert!(stdout.contains("<title>Local page</title>"));
    }

    #[test]
    fn folder_output_with_policies() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());

        webscrap(dir.path())
            .args([
                "page.html",
                "-f",
                "folder",
                "-o",
                "saved",
                "-p",
                "image=remove",
                "--save-manifest",
                "-s",
            ])
            .assert()
            .success();

        let saved = dir.path().join("saved");
        assert!(saved.join("index.html").is_file());
        assert!(saved.join("style.css").is_file());
        assert!(saved.join("manifest.json").is_file());
        assert!(!saved.join("pic.png").exists());
    }
}

#[cfg(test)]
mod failing {
    use super::*;

    #[test]
    fn missing_local_file() {
        let dir = tempfile::tempdir().unwrap();

        webscrap(dir.path())
            .args(["file:///nonexistent/webscrap/page.html", "-o", "-", "-s"])
            .assert()
            .failure();
    }

    #[test]
    fn bad_policy_argument() {
        let dir = tempfile::tempdir().unwrap();

        webscrap(dir.path())
            .args(["page.html", "-p", "image=keep"])
            .assert()
            .failure();
    }

    #[test]
    fn bad_options_file() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());
        fs::write(dir.path().join("webscrap.toml"), "container = \"tarball\"\n").unwrap();

        webscrap(dir.path())
            .args(["page.html", "-s"])
            .assert()
            .failure();
    }
}
