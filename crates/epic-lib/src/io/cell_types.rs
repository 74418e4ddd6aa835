/// Shorthand cell-type codes and their descriptive names.
const FULL_NAMES: &[(&str, &str)] = &[
    ("OnP", "ON-parasol"),
    ("OffP", "OFF-parasol"),
    ("OnM", "ON-midget"),
    ("OffM", "OFF-midget"),
    ("BlueOffM", "Blue OFF-midget"),
    ("OnS", "ON-stratified"),
    ("OffS", "OFF-stratified"),
    ("SBC", "small-bistratified"),
    ("BT", "bistratified-transient"),
    ("Tufted", "tufted"),
    ("OnLarge", "ON-large"),
    ("OffLarge", "OFF-large"),
    ("OnMystery", "ON-mystery"),
    ("OffMystery", "OFF-mystery"),
    ("OffBoring", "OFF-boring"),
    ("OnWiggles", "ON-wiggles"),
    ("InterestingIfTrue", "interesting-if-true"),
    ("BigMas", "big-mas"),
    ("Spotty", "spotty"),
    ("Shadow", "shadow"),
    ("Blobby", "blobby"),
    ("Xmas", "xmas"),
    ("OnAmacrine", "ON-amacrine"),
    ("OffAmacrine", "OFF-amacrine"),
    ("BlueAmacrine", "blue-amacrine"),
    ("Amacrine", "amacrine"),
    ("A1", "A1-amacrine"),
    ("RB", "rod-bipolar"),
    ("BlueMystery", "blue-mystery"),
    ("BluePeaky", "blue-peaky"),
    ("RGC", "RGC"),
    ("Unknown", "unknown"),
];

/// Ganglion-cell codes, which take the `RGC\` prefix.
const RGC_CODES: &[&str] = &[
    "OnP",
    "OffP",
    "OnM",
    "OffM",
    "BlueOffM",
    "OnS",
    "OffS",
    "SBC",
    "BT",
    "Tufted",
    "OnLarge",
    "OffLarge",
    "OnMystery",
    "OffMystery",
    "OffBoring",
    "OnWiggles",
    "InterestingIfTrue",
    "BigMas",
    "Spotty",
    "Shadow",
    "Blobby",
    "Xmas",
];

/// Descriptive name for a shorthand code. Unknown codes pass through.
pub fn full_name(code: &str, prefix_rgc: bool) -> String {
    match FULL_NAMES.iter().find(|(short, _)| *short == code) {
        Some((_, name)) if prefix_rgc && RGC_CODES.contains(&code) => format!("RGC\\{name}"),
        Some((_, name)) => (*name).to_string(),
        None => code.to_string(),
    }
}
