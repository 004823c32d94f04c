#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    fragment: &'a str,
    ranges: Vec<(usize, usize)>,
    open: &'a str,
    close: &'a str,
}

fuzz_target!(|input: Input| {
    // Ranges may be out of bounds, reversed or split a char: never panic
    let ranges: Vec<_> = input.ranges.iter().map(|&(start, end)| start..end).collect();
    let marked = markdex::query::render_highlighted(input.fragment, &ranges, input.open, input.close);

    let plain = markdex::query::strip_markers(&marked, input.open, input.close);
    assert!(plain.len() <= marked.len());
});
