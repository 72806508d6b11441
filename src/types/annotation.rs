db_enum! {
    /// W3C Web Annotation motivations accepted by the studio.
    pub enum Motivation as "motivation" {
        Commenting => "commenting",
        Describing => "describing",
        Classifying => "classifying",
        Linking => "linking",
        Questioning => "questioning",
        Tagging => "tagging",
        Highlighting => "highlighting",
    }
}

impl Motivation {
    /// Maps any W3C/IIIF motivation onto the supported set.
    ///
    /// Namespace prefixes (`oa:`, `sc:`, full IRIs) are stripped first.
    /// Unknown motivations fall back to `commenting`.
    pub fn from_external(raw: &str) -> Self {
        let local = raw
            .rsplit(|c| c == ':' || c == '#' || c == '/')
            .next()
            .unwrap_or(raw)
            .trim()
            .to_lowercase();
        match local.as_str() {
            "bookmarking" => Motivation::Tagging,
            "identifying" => Motivation::Classifying,
            "editing" | "moderating" | "replying" => Motivation::Commenting,
            "assessing" | "painting" | "supplementing" => Motivation::Describing,
            other => other.parse().unwrap_or(Motivation::Commenting),
        }
    }
}

db_enum! {
    pub enum Visibility as "visibility" {
        Private => "private",
        Shared => "shared",
        Public => "public",
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Private
    }
}

db_enum! {
    pub enum AnnotationStatus as "annotation status" {
        Active => "active",
        Deleted => "deleted",
    }
}

db_enum! {
    pub enum SelectorType as "selector type" {
        TextQuoteSelector => "TextQuoteSelector",
        FragmentSelector => "FragmentSelector",
        SvgSelector => "SvgSelector",
        PointSelector => "PointSelector",
        RangeSelector => "RangeSelector",
        TimeSelector => "TimeSelector",
    }
}
