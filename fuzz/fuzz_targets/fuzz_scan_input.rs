#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use markdex::utils::MarkupSuffixes;
use std::path::Path;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    search: &'a str,
    grep_stdout: &'a [u8],
}

fuzz_target!(|input: Input| {
    // Any search text yields a matcher, either as a regex or as a literal
    let _ = markdex::scan::builtin::build_matcher(input.search);

    // grep output is untrusted bytes
    let suffixes = MarkupSuffixes::new([".md", ".org"]);
    let _ = markdex::scan::grep::parse_output(input.grep_stdout, Path::new("/srv/docs"), &suffixes);
});
