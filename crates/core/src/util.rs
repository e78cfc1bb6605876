use url::Url;

pub trait UrlExt {
    fn with_segments<I>(&self, segments: I) -> Url
    where
        I: IntoIterator,
        I::Item: AsRef<str>;
    fn path_and_query(&self) -> &str;
}

impl UrlExt for Url {
    /// Append path segments, percent-encoding each one.
    #[inline]
    fn with_segments<I>(&self, segments: I) -> Url
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut out = self.clone();
        if let Ok(mut path) = out.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        out
    }

    #[inline]
    fn path_and_query(&self) -> &str { &self[url::Position::BeforePath..] }
}
