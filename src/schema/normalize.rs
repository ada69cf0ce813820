/// Turn a free-form label into a camelCase identifier.
///
/// Words are split on any non-alphanumeric character and on case changes
/// (`fooBar`, `URLValue`). The first word is lowercased, the rest are
/// capitalized: `First Name` -> `firstName`, `USER_ID` -> `userId`,
/// `E-mail` -> `eMail`. Labels without any alphanumeric character yield an
/// empty string.
pub fn camel_case(label: &str) -> String {
    let mut out = String::with_capacity(label.len());

    for (i, word) in split_words(label).iter().enumerate() {
        let lower = word.to_lowercase();
        if i == 0 {
            out.push_str(&lower);
            continue;
        }
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }

    out
}

fn split_words(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if !current.is_empty() && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_numeric()
                || (prev.is_uppercase() && next_is_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }

    words
}
