//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod passing {
    use webscrap::config::parse_options;
    use webscrap::network::ReferrerPolicy;
    use webscrap::{ContainerKind, CssMode, Policy, ResourceCategory};

    #[test]
    fn every_category_has_a_policy() {
        let options = parse_options(
            r#"
            [policies]
            image_background = "blank"
            favicon = "remove"
            frame = "link"
            "#,
        )
        .unwrap();

        assert_eq!(options.policies.get(ResourceCategory::ImageBackground), Policy::Blank);
        assert_eq!(options.policies.get(ResourceCategory::Favicon), Policy::Remove);
        assert_eq!(options.policies.get(ResourceCategory::Frame), Policy::Link);
        assert_eq!(options.policies.get(ResourceCategory::Script), Policy::Blank);
        assert_eq!(options.policies.get(ResourceCategory::Image), Policy::Save);
    }

    #[test]
    fn defaults() {
        let options = parse_options("").unwrap();

        assert_eq!(options.css_mode, CssMode::RawUrl);
        assert_eq!(options.container, ContainerKind::Zip);
        assert_eq!(options.referrer_policy, ReferrerPolicy::default());
        assert_eq!(options.max_depth, None);
        assert!(!options.link_unsaved);
        assert!(!options.record_rewrites);
    }

    #[test]
    fn css_modes() {
        for (name, mode) in [
            ("raw-url", CssMode::RawUrl),
            ("tidy", CssMode::Tidy),
            ("match", CssMode::Match),
            ("none", CssMode::None),
        ] {
            let options = parse_options(&format!("css_mode = \"{name}\"")).unwrap();
            assert_eq!(options.css_mode, mode);
        }
    }
}

//  ███████╗ █████╗ ██╗██╗     ██╗███╗   ██╗ ██████╗
//  ██╔════╝██╔══██╗██║██║     ██║████╗  ██║██╔════╝
//  █████╗  ███████║██║██║     ██║██╔██╗ ██║██║  ███╗
//  ██╔══╝  ██╔══██║██║██║     ██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║██║███████╗██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚═╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod failing {
    use webscrap::config::parse_options;
    use webscrap::CaptureError;

    #[test]
    fn unknown_policy() {
        let result = parse_options("[policies]\nimage = \"keep\"\n");
        assert!(matches!(result, Err(CaptureError::Config(_))));
    }

    #[test]
    fn wrong_type() {
        let result = parse_options("max_depth = \"deep\"");
        assert!(matches!(result, Err(CaptureError::Config(_))));
    }
}
