use std::fmt::Write;

use super::quality;

/// File name of every manifest the service writes, both per quality and
/// at the top of a media's prefix.
pub const MANIFEST_NAME: &str = "master.m3u8";

/// Renders the master manifest for the qualities finished so far.
///
/// Entries are ordered by ascending catalog bandwidth; qualities with equal
/// bandwidth keep their completion order. Labels missing from the catalog are
/// skipped.
pub fn build_master_playlist<S: AsRef<str>>(completed: &[S]) -> String {
    let mut profiles: Vec<_> = completed
        .iter()
        .filter_map(|q| quality::lookup(q.as_ref()))
        .collect();
    profiles.sort_by_key(|p| p.bandwidth);

    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for p in profiles {
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}",
            p.bandwidth, p.resolution
        );
        let _ = writeln!(out, "{}/{}", p.label, MANIFEST_NAME);
    }
    out
}
