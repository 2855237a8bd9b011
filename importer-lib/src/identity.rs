//! Login handle and email derivation from a native-script surname.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const RUSSIAN: &[(char, &str)] = &[
    ('а', "a"),
    ('б', "b"),
    ('в', "v"),
    ('г', "g"),
    ('д', "d"),
    ('е', "e"),
    ('ё', "e"),
    ('ж', "zh"),
    ('з', "z"),
    ('и', "i"),
    ('й', "j"),
    ('к', "k"),
    ('л', "l"),
    ('м', "m"),
    ('н', "n"),
    ('о', "o"),
    ('п', "p"),
    ('р', "r"),
    ('с', "s"),
    ('т', "t"),
    ('у', "u"),
    ('ф', "f"),
    ('х', "h"),
    ('ц', "ts"),
    ('ч', "ch"),
    ('ш', "sh"),
    ('щ', "sch"),
    ('ъ', ""),
    ('ы', "y"),
    ('ь', ""),
    ('э', "e"),
    ('ю', "ju"),
    ('я', "ja"),
];

const UKRAINIAN: &[(char, &str)] = &[
    ('а', "a"),
    ('б', "b"),
    ('в', "v"),
    ('г', "h"),
    ('ґ', "g"),
    ('д', "d"),
    ('е', "e"),
    ('є', "ie"),
    ('ж', "zh"),
    ('з', "z"),
    ('и', "y"),
    ('і', "i"),
    ('ї', "i"),
    ('й', "i"),
    ('к', "k"),
    ('л', "l"),
    ('м', "m"),
    ('н', "n"),
    ('о', "o"),
    ('п', "p"),
    ('р', "r"),
    ('с', "s"),
    ('т', "t"),
    ('у', "u"),
    ('ф', "f"),
    ('х', "kh"),
    ('ц', "ts"),
    ('ч', "ch"),
    ('ш', "sh"),
    ('щ', "shch"),
    ('ь', ""),
    ('ю', "iu"),
    ('я', "ia"),
];

/// Source script of the surname column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Script {
    #[default]
    Russian,
    Ukrainian,
}

impl Script {
    fn table(self) -> &'static [(char, &'static str)] {
        match self {
            Script::Russian => RUSSIAN,
            Script::Ukrainian => UKRAINIAN,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Script::Russian => "ru",
            Script::Ukrainian => "uk",
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Script {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ru" | "russian" => Ok(Script::Russian),
            "uk" | "ukrainian" => Ok(Script::Ukrainian),
            other => Err(anyhow::anyhow!(
                "Unsupported script code '{other}'. Expected one of: ru, uk"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Native script to an ASCII slug. This is what handle derivation uses.
    #[default]
    ToLatin,
    /// Latin back to the native script (greedy longest match).
    ToNative,
}

/// Deterministic per-character transliteration for one script.
#[derive(Debug, Clone)]
pub struct Transliterator {
    script: Script,
    direction: Direction,
    forward: HashMap<char, &'static str>,
    reverse: HashMap<&'static str, char>,
    longest_latin: usize,
}

impl Transliterator {
    pub fn new(script: Script, direction: Direction) -> Self {
        let table = script.table();
        let forward: HashMap<char, &'static str> = table.iter().copied().collect();

        // First entry wins when several letters share one Latin spelling.
        let mut reverse: HashMap<&'static str, char> = HashMap::new();
        for (native, latin) in table {
            if !latin.is_empty() {
                reverse.entry(*latin).or_insert(*native);
            }
        }
        let longest_latin = reverse.keys().map(|latin| latin.len()).max().unwrap_or(1);

        Transliterator {
            script,
            direction,
            forward,
            reverse,
            longest_latin,
        }
    }

    pub fn to_latin(script: Script) -> Self {
        Self::new(script, Direction::ToLatin)
    }

    pub fn script(&self) -> Script {
        self.script
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn transliterate(&self, text: &str) -> String {
        match self.direction {
            Direction::ToLatin => self.latinize(text),
            Direction::ToNative => self.nativize(text),
        }
    }

    fn latinize(&self, text: &str) -> String {
        let mut slug = String::with_capacity(text.len());
        for ch in text.chars() {
            let lower = ch.to_lowercase().next().unwrap_or(ch);
            if let Some(latin) = self.forward.get(&lower) {
                if ch != lower {
                    let mut letters = latin.chars();
                    if let Some(first) = letters.next() {
                        slug.push(first.to_ascii_uppercase());
                        slug.extend(letters);
                    }
                } else {
                    slug.push_str(latin);
                }
            } else if ch.is_ascii_alphanumeric() || ch == '-' {
                slug.push(ch);
            }
        }
        slug
    }

    fn nativize(&self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut result = String::with_capacity(text.len() * 2);
        let mut position = 0;

        while position < chars.len() {
            let mut matched = false;
            let max_len = self.longest_latin.min(chars.len() - position);
            for len in (1..=max_len).rev() {
                let chunk: String = chars[position..position + len].iter().collect();
                if let Some(native) = self.reverse.get(chunk.to_lowercase().as_str()) {
                    if chars[position].is_uppercase() {
                        result.extend(native.to_uppercase());
                    } else {
                        result.push(*native);
                    }
                    position += len;
                    matched = true;
                    break;
                }
            }
            if !matched {
                result.push(chars[position]);
                position += 1;
            }
        }
        result
    }
}

impl Default for Transliterator {
    fn default() -> Self {
        Self::to_latin(Script::default())
    }
}

/// One data row as read from the source worksheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InputRow {
    /// 0-based worksheet row, header included.
    pub row_index: usize,
    pub surname: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub group_year: String,
}

impl InputRow {
    /// 1-based row number as shown by spreadsheet applications.
    pub fn row_number(&self) -> usize {
        self.row_index + 1
    }
}

/// A fully derived account, ready to be provisioned.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRecord {
    pub row_index: usize,
    pub login_handle: String,
    pub surname: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub transliterated_surname: String,
    pub group_year: String,
    pub email: String,
}

impl AccountRecord {
    /// Second word of the display name ("Ivanov Ivan Ivanovich" -> "Ivan").
    pub fn given_name(&self) -> Option<&str> {
        self.full_name.split_whitespace().nth(1)
    }

    pub fn row_number(&self) -> usize {
        self.row_index + 1
    }
}

pub fn derive_login_handle(surname: &str, group_year: &str, transliterator: &Transliterator) -> String {
    format!("{}{}", transliterator.transliterate(surname), group_year.trim())
}

pub fn derive_identity(row: &InputRow, domain: &str, transliterator: &Transliterator) -> AccountRecord {
    let transliterated_surname = transliterator.transliterate(&row.surname);
    let login_handle = derive_login_handle(&row.surname, &row.group_year, transliterator);
    let email = format!("{}@{}", login_handle, domain.trim());

    AccountRecord {
        row_index: row.row_index,
        login_handle,
        surname: row.surname.clone(),
        password: row.password.clone(),
        full_name: row.full_name.clone(),
        phone: row.phone.clone(),
        transliterated_surname,
        group_year: row.group_year.trim().to_string(),
        email,
    }
}
