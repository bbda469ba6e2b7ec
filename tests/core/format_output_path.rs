//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod passing {
    use webscrap::core::{format_output_path, ContainerKind};

    #[test]
    fn as_is() {
        let final_destination = format_output_path(
            "/home/username/Downloads/website.htz",
            Some(""),
            ContainerKind::Zip,
        );

        assert_eq!(final_destination, "/home/username/Downloads/website.htz");
    }

    #[test]
    fn substitute_title_multi() {
        let final_destination = format_output_path(
            "/home/username/Downloads/%title%/%title%.html",
            Some("Document Title"),
            ContainerKind::SingleHtml,
        );

        assert_eq!(
            final_destination,
            "/home/username/Downloads/Document Title/Document Title.html"
        );
    }

    #[test]
    fn sanitize() {
        let final_destination = format_output_path(
            r#"/home/username/Downloads/<>:"|?/%title%.html"#,
            Some(r#"/\<>:"|?"#),
            ContainerKind::SingleHtml,
        );

        assert_eq!(
            final_destination,
            r#"/home/username/Downloads/<>:"|?/__[] - -.html"#
        );
    }

    #[test]
    fn level_up() {
        let final_destination =
            format_output_path("../%title%.maff", Some(".Title"), ContainerKind::Maff);

        assert_eq!(final_destination, r#"../Title.maff"#);
    }

    #[test]
    fn missing_title() {
        let final_destination =
            format_output_path("%title%.%extension%", None, ContainerKind::Zip);

        assert_eq!(final_destination, r#".htz"#);
    }

    #[test]
    fn extension_per_container() {
        let cases = [
            (ContainerKind::Zip, "Title.htz", "Title.htz"),
            (ContainerKind::Maff, "Title.maff", "Title.maff"),
            (ContainerKind::SingleHtml, "Title.html", "Title.htm"),
            (ContainerKind::Folder, "Title.", "Title."),
        ];

        for (container, long, short) in cases {
            assert_eq!(
                format_output_path("%title%.%extension%", Some("Title"), container),
                long
            );
            assert_eq!(
                format_output_path("%title%.%ext%", Some("Title"), container),
                short
            );
        }
    }

    #[test]
    fn timestamp_has_no_colons() {
        let final_destination =
            format_output_path("%timestamp%", None, ContainerKind::Zip);

        assert!(!final_destination.contains(':'));
        assert!(final_destination.ends_with('Z'));
    }
}
