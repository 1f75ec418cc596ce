use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Length of the tokens handed out for sessions
pub const TOKEN_LENGTH: usize = 32;

/// Characters added to a file name by [with_random_suffix], the underscore included
pub const SUFFIX_LENGTH: usize = 8;

pub fn random_string(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Inserts a random suffix before the extension, so `cat.png` becomes `cat_Xa81kQz.png`
pub fn with_random_suffix(file_name: &str) -> String {
    let suffix = random_string(SUFFIX_LENGTH - 1);

    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => format!("{stem}_{suffix}.{extension}"),
        _ => format!("{file_name}_{suffix}"),
    }
}
