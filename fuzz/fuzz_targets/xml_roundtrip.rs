#![no_main]
use libfuzzer_sys::fuzz_target;
use zbind::xml::writer;
use zbind::{parse_str, Config, Parser};

// Anything the parser accepts must render to text that parses to the same rendering.
fuzz_target!(|data: &[u8]| {
    let Ok(doc) = Parser::new(data).parse() else {
        return;
    };
    let config = Config::default();
    let first = writer::to_string(&doc, &config);
    let reparsed = match parse_str(&first) {
        Ok(doc) => doc,
        Err(err) => panic!("rendered document failed to parse: {err}\n{first}"),
    };
    assert_eq!(first, writer::to_string(&reparsed, &config));
});
