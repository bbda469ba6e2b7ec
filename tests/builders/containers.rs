//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod passing {
    use std::fs;

    use url::Url;
    use webscrap::builders::{assemble, assemble_bytes, build_maff, build_zip};
    use webscrap::capture::Manifest;
    use webscrap::{capture_with_session, CaptureOutput, CaptureSession, ContainerKind, HtmlParser};

    use crate::common::{absolute, options, run, unzip, MockTransport, PNG, TIME_ID};

    fn capture(container: ContainerKind, save_manifest: bool) -> CaptureOutput {
        let transport = MockTransport::new()
            .page(
                "index.html",
                r#"<title>Tom &amp; Jerry</title><img src="cat.png"><img src="mouse.png">"#,
            )
            .png("cat.png")
            .serve("mouse.png", b"GIF89a-mouse", "image/gif");
        let mut options = options();
        options.container = container;
        options.save_manifest = save_manifest;
        run(&transport, options).unwrap()
    }

    fn names(entries: &[(String, Vec<u8>)]) -> Vec<&str> {
        entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    #[test]
    fn zip_follows_the_manifest() {
        let output = capture(ContainerKind::Zip, false);
        let entries = unzip(&build_zip(&output).unwrap());

        assert_eq!(names(&entries), vec!["cat.png", "mouse.png.gif", "index.html"]);
        assert_eq!(entries[0].1, PNG);
    }

    #[test]
    fn zip_with_manifest() {
        let output = capture(ContainerKind::Zip, true);
        let entries = unzip(&assemble_bytes(&output).unwrap());
        let (name, json) = entries.last().unwrap();

        assert_eq!(name, "manifest.json");
        let manifest = Manifest::from_json(std::str::from_utf8(json).unwrap()).unwrap();
        assert_eq!(manifest, output.manifest);
        assert_eq!(manifest.index_pages, vec!["index.html".to_string()]);
    }

    #[test]
    fn maff_nests_entries_under_the_time_id() {
        let output = capture(ContainerKind::Maff, false);
        let entries = unzip(&build_maff(&output).unwrap());
        let rdf = entries
            .iter()
            .find(|(name, _)| name == &format!("{TIME_ID}/index.rdf"))
            .map(|(_, bytes)| String::from_utf8(bytes.clone()).unwrap())
            .unwrap();

        assert!(entries.iter().all(|(name, _)| name.starts_with(&format!("{TIME_ID}/"))));
        assert!(entries.iter().any(|(name, _)| name == &format!("{TIME_ID}/index.html")));
        assert!(rdf.contains(r#"<MAF:originalurl RDF:resource="https://example.com/index.html"/>"#));
        assert!(rdf.contains(r#"<MAF:title RDF:resource="Tom &amp; Jerry"/>"#));
        assert!(rdf.contains(r#"<MAF:archivetime RDF:resource="Tue, 02 Jan 2024 03:04:05 GMT"/>"#));
        assert!(rdf.contains(r#"<MAF:indexfilename RDF:resource="index.html"/>"#));
    }

    #[test]
    fn single_html_is_the_index_document() {
        let output = capture(ContainerKind::SingleHtml, false);
        let bytes = assemble_bytes(&output).unwrap();
        let html = String::from_utf8(bytes).unwrap();

        assert!(html.contains("data:image/png;filename=cat.png;base64,"));
        assert!(html.contains("data:image/gif;filename=mouse.png;base64,"));
    }

    #[test]
    fn folder_is_written_to_disk() {
        let output = capture(ContainerKind::Folder, true);
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("archive");

        assemble(&output, &target).unwrap();

        assert_eq!(fs::read(target.join("cat.png")).unwrap(), PNG);
        assert!(target.join("mouse.png.gif").is_file());
        assert!(target.join("manifest.json").is_file());
        let html = fs::read_to_string(target.join("index.html")).unwrap();
        assert!(html.contains(r#"src="mouse.png.gif""#));
    }

    #[test]
    fn file_containers_create_parent_directories() {
        let output = capture(ContainerKind::Zip, false);
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("page.htz");

        assemble(&output, &target).unwrap();

        let entries = unzip(&fs::read(&target).unwrap());
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn xhtml_root_gets_a_redirect_stub() {
        let transport = MockTransport::new().serve(
            "index.html",
            br#"<html xmlns="http://www.w3.org/1999/xhtml"><body/></html>"#,
            "application/xhtml+xml",
        );
        let output = run(&transport, options()).unwrap();
        let entries = unzip(&build_zip(&output).unwrap());

        assert_eq!(names(&entries), vec!["index.xhtml", "index.html"]);
        assert!(String::from_utf8_lossy(&entries[1].1).contains("url=index.xhtml"));
    }

    #[test]
    fn single_html_embeds_a_non_html_root() {
        let transport = MockTransport::new().png("photo.png");
        let mut options = options();
        options.container = ContainerKind::SingleHtml;
        let session = CaptureSession::with_time_id(options, TIME_ID).unwrap();
        let target = Url::parse(&absolute("photo.png")).unwrap();

        let output =
            capture_with_session(session, &target, &transport, &HtmlParser::new()).unwrap();
        let html = String::from_utf8(assemble_bytes(&output).unwrap()).unwrap();

        assert_eq!(output.files.len(), 1);
        assert!(html.contains("url=data:image/png;filename=photo.png;base64,"));
        assert!(!html.contains("url=photo.png"));
    }
}

//  ███████╗ █████╗ ██╗██╗     ██╗███╗   ██╗ ██████╗
//  ██╔════╝██╔══██╗██║██║     ██║████╗  ██║██╔════╝
//  █████╗  ███████║██║██║     ██║██╔██╗ ██║██║  ███╗
//  ██╔══╝  ██╔══██║██║██║     ██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║██║███████╗██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod failing {
    use webscrap::builders::assemble_bytes;
    use webscrap::{CaptureError, ContainerKind};

    use crate::common::{options, run, MockTransport};

    #[test]
    fn folder_has_no_byte_stream() {
        let transport = MockTransport::new().page("index.html", "<p>x</p>");
        let mut options = options();
        options.container = ContainerKind::Folder;
        let output = run(&transport, options).unwrap();

        assert!(matches!(
            assemble_bytes(&output),
            Err(CaptureError::UnsupportedContainerOperation(_))
        ));
    }

    #[test]
    fn missing_staged_bytes_is_internal() {
        let transport = MockTransport::new().page("index.html", "<p>x</p>");
        let mut output = run(&transport, options()).unwrap();
        output.files.clear();

        assert!(matches!(assemble_bytes(&output), Err(CaptureError::Internal(_))));
    }
}
