//! Deterministic SQL corrections
//!
//! Models drift from the schema in a handful of predictable ways. Each correction is a
//! named pure function over the statement text; the pipeline runs them in a fixed order.
//! Every pass, and therefore the whole pipeline, is idempotent.

use crate::safety_guardrails::FORBIDDEN_KEYWORDS;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

/// One named text rewrite
#[derive(Clone, Copy)]
pub struct CorrectionPass {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

impl std::fmt::Debug for CorrectionPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrectionPass").field("name", &self.name).finish()
    }
}

pub const PASSES: &[CorrectionPass] = &[
    CorrectionPass { name: "strip_code_fences", apply: strip_code_fences },
    CorrectionPass { name: "canonical_status_filter", apply: canonical_status_filter },
    CorrectionPass { name: "canonical_display_names", apply: canonical_display_names },
    CorrectionPass { name: "inject_product_join", apply: inject_product_join },
    CorrectionPass { name: "collapse_commas", apply: collapse_commas },
];

/// Run every pass in order.
pub fn apply_corrections(raw: &str) -> String {
    PASSES.iter().fold(raw.to_string(), |sql, pass| {
        let corrected = (pass.apply)(&sql);
        if corrected != sql {
            debug!("Correction pass {} rewrote the statement", pass.name);
        }
        corrected
    })
}

lazy_static! {
    static ref FIRST_SELECT: Regex = Regex::new(r"(?i)\bSELECT\b").expect("valid pattern");
    static ref WORD: Regex = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("valid pattern");

    static ref LEGACY_STATUS_LIST: Regex = Regex::new(
        concat!(
            r"(?i)\b((?:[A-Za-z_][A-Za-z0-9_]*\.)?status)\s+IN\s*\(",
            r"\s*'(?:paid|unpaid|remaining)'(?:\s*,\s*'(?:paid|unpaid|remaining)')*\s*\)",
        )
    )
    .expect("valid pattern");

    static ref TABLE_NAME: Regex = Regex::new(
        r"(?i)(?:\b(?:FROM|JOIN)\s+|,\s*)`?([A-Za-z_][A-Za-z0-9_]*)`?"
    )
    .expect("valid pattern");
    static ref ALIAS_AFTER: Regex =
        Regex::new(r"(?i)^\s+(?:AS\s+)?([A-Za-z_][A-Za-z0-9_]*)").expect("valid pattern");
    static ref FROM_KEYWORD: Regex = Regex::new(r"(?i)\bFROM\b").expect("valid pattern");
    static ref FROM_LIST_END: Regex =
        Regex::new(r"(?i)\b(?:SELECT|WHERE|ON|USING|GROUP|ORDER|HAVING|LIMIT)\b|[()]")
            .expect("valid pattern");
    static ref BARE_NAME: Regex = Regex::new(r"(?i)\bname\b").expect("valid pattern");

    static ref LEADING_ON: Regex = Regex::new(r"(?i)^\s+ON\s+").expect("valid pattern");
    static ref WHERE_KEYWORD: Regex = Regex::new(r"(?i)\bWHERE\b").expect("valid pattern");
    static ref TAIL_CLAUSE: Regex =
        Regex::new(r"(?i)\b(?:GROUP\s+BY|ORDER\s+BY|HAVING|LIMIT)\b").expect("valid pattern");

    static ref REPEATED_COMMAS: Regex = Regex::new(r",(?:\s*,)+").expect("valid pattern");
    static ref COMMA_BEFORE_CLAUSE: Regex =
        Regex::new(r"(?i),(\s*)\b(FROM|WHERE|GROUP|ORDER|HAVING|LIMIT)\b").expect("valid pattern");
    static ref COMMA_BEFORE_PAREN: Regex = Regex::new(r",(\s*)\)").expect("valid pattern");
    static ref TRAILING_COMMA: Regex = Regex::new(r",\s*$").expect("valid pattern");
}

/// Words that may follow a table name without being its alias.
const NOT_AN_ALIAS: &[&str] = &[
    "on", "where", "join", "left", "right", "inner", "outer", "cross", "full", "natural", "group",
    "order", "limit", "having", "using", "union", "straight_join", "as", "set", "window",
];

/// Tables with no `name` column, so a bare `name` next to them is unambiguous.
const NAMELESS_TABLES: &[&str] = &["sales_invoice", "sales_items", "stock", "users"];

/// Display column standing in for `name` on tables that have none.
const DISPLAY_COLUMNS: &[(&str, &str)] = &[
    ("contacts", "company"),
    ("products_category", "title"),
    ("warehouses", "title"),
];

/// A table named in a FROM list, after JOIN, or after a comma in the FROM list.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TableRef {
    table: String,
    /// Alias if one is given, otherwise the table name.
    qualifier: String,
    start: usize,
    end: usize,
}

fn table_refs(sql: &str) -> Vec<TableRef> {
    TABLE_NAME
        .captures_iter(sql)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            if whole.as_str().starts_with(',') && !in_from_list(sql, whole.start()) {
                return None;
            }
            // `,  sales_items.price` is a column, `FROM fn(` is not a table
            if matches!(sql[whole.end()..].chars().next(), Some('.') | Some('(')) {
                return None;
            }
            let alias = ALIAS_AFTER.captures(&sql[whole.end()..]).and_then(|a| {
                let word = a.get(1)?;
                if NOT_AN_ALIAS.contains(&word.as_str().to_lowercase().as_str()) {
                    return None;
                }
                Some((word.as_str().to_string(), whole.end() + a.get(0)?.end()))
            });
            let (qualifier, end) =
                alias.unwrap_or_else(|| (name.as_str().to_string(), whole.end()));
            Some(TableRef {
                table: name.as_str().to_lowercase(),
                qualifier,
                start: whole.start(),
                end,
            })
        })
        .collect()
}

/// A comma continues a FROM list when nothing but table names and aliases sit between
/// the closest FROM and the comma.
fn in_from_list(sql: &str, comma: usize) -> bool {
    let Some(from) = FROM_KEYWORD.find_iter(&sql[..comma]).last() else {
        return false;
    };
    !FROM_LIST_END.is_match(&sql[from.end()..comma])
}

fn find_table_ref(sql: &str, table: &str) -> Option<TableRef> {
    table_refs(sql).into_iter().find(|t| t.table.eq_ignore_ascii_case(table))
}

fn qualified(qualifier: &str, column: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?i)\b{}\.{}\b", regex::escape(qualifier), regex::escape(column))).ok()
}

fn equality(left: &str, right: &str, column: &str) -> Option<Regex> {
    let pattern = format!(
        r"(?i)\b(?:{l}\.{c}\s*=\s*{r}\.{c}|{r}\.{c}\s*=\s*{l}\.{c})\b",
        l = regex::escape(left),
        r = regex::escape(right),
        c = regex::escape(column)
    );
    Regex::new(&pattern).ok()
}

/// Remove markdown fences and any prose before the first SELECT.
///
/// Text in front of the SELECT is only dropped when it holds no forbidden keyword, so a
/// `DELETE ... WHERE id IN (SELECT ...)` reaches the read-only check whole.
pub fn strip_code_fences(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(open) = text.find("```") {
        let after_fence = &text[open + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(after_fence.len());
        let first_line = &after_fence[..body_start];
        // ```sql\n  vs  ```SELECT ...
        let body = if first_line.trim().chars().all(|c| c.is_ascii_alphanumeric()) {
            &after_fence[body_start..]
        } else {
            after_fence
        };
        text = match body.find("```") {
            Some(close) => &body[..close],
            None => body,
        };
    }

    if let Some(m) = FIRST_SELECT.find(text) {
        if !has_forbidden_word(&text[..m.start()]) {
            text = &text[m.start()..];
        }
    }

    text.trim().trim_end_matches(';').trim_end().to_string()
}

fn has_forbidden_word(text: &str) -> bool {
    WORD.find_iter(text)
        .any(|w| FORBIDDEN_KEYWORDS.iter().any(|kw| w.as_str().eq_ignore_ascii_case(kw)))
}

/// Replace the legacy paid/unpaid/remaining status list with the canonical exclusion list.
pub fn canonical_status_filter(sql: &str) -> String {
    LEGACY_STATUS_LIST
        .replace_all(sql, "$1 NOT IN ('draft', 'draft_return', 'return', 'canceled')")
        .into_owned()
}

/// Point `name` on customers, categories and warehouses at the columns that exist.
///
/// Qualified `alias.name` is always rewritten. A bare `name` is rewritten only when one
/// display table is in the FROM list and every other table there lacks a `name` column.
pub fn canonical_display_names(sql: &str) -> String {
    let mut out = sql.to_string();
    for (table, column) in DISPLAY_COLUMNS {
        let Some(table_ref) = find_table_ref(&out, table) else {
            continue;
        };
        let mut qualifiers = vec![table_ref.qualifier.clone()];
        if !table_ref.qualifier.eq_ignore_ascii_case(table) {
            qualifiers.push(table.to_string());
        }
        for qualifier in qualifiers {
            let Some(pattern) = qualified(&qualifier, "name") else {
                continue;
            };
            let replacement = format!("{}.{}", qualifier, column);
            out = pattern.replace_all(&out, replacement.as_str()).into_owned();
        }
    }

    let refs = table_refs(&out);
    let mut display = refs
        .iter()
        .filter_map(|r| DISPLAY_COLUMNS.iter().find(|(t, _)| *t == r.table).map(|d| (r, d.1)));
    let (Some((table_ref, column)), None) = (display.next(), display.next()) else {
        return out;
    };
    let others_nameless = refs
        .iter()
        .filter(|r| r.table != table_ref.table)
        .all(|r| NAMELESS_TABLES.contains(&r.table.as_str()));
    if !others_nameless {
        return out;
    }
    let replacement = format!("{}.{}", table_ref.qualifier, column);
    rewrite_bare_name(&out, &replacement)
}

/// Replace `name` used as a bare column; qualified names, calls, quoted text and
/// `AS name` aliases are left alone.
fn rewrite_bare_name(sql: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for m in BARE_NAME.find_iter(sql) {
        let before = sql[..m.start()].chars().next_back();
        let after = sql[m.end()..].chars().next();
        let aliased = sql[..m.start()]
            .trim_end()
            .rsplit(|c: char| c.is_whitespace())
            .next()
            .map(|w| w.eq_ignore_ascii_case("as"))
            .unwrap_or(false);
        let bare = !matches!(before, Some('.' | '`' | '\'' | '"' | '@'))
            && !matches!(after, Some('.' | '(' | '`' | '\'' | '"'))
            && !aliased;
        if bare {
            out.push_str(&sql[last..m.start()]);
            out.push_str(replacement);
            last = m.end();
        }
    }
    out.push_str(&sql[last..]);
    out
}

/// Make sure line items and stock rows are matched on product as well as invoice.
pub fn inject_product_join(sql: &str) -> String {
    let items = find_table_ref(sql, "sales_items");
    let stock = find_table_ref(sql, "stock");
    let (Some(items), Some(stock)) = (items, stock) else {
        return sql.to_string();
    };
    let (qi, qs) = (items.qualifier.as_str(), stock.qualifier.as_str());
    let (Some(same_product), Some(same_invoice)) = (
        equality(qi, qs, "product_id"),
        equality(qi, qs, "invoice_id"),
    ) else {
        return sql.to_string();
    };
    if same_product.is_match(sql) {
        return sql.to_string();
    }
    let predicate = format!("{}.product_id = {}.product_id", qi, qs);

    if let Some(m) = same_invoice.find(sql) {
        return format!("{} AND {}{}", &sql[..m.end()], predicate, &sql[m.end()..]);
    }

    let later = if items.start > stock.start { &items } else { &stock };
    if let Some(m) = LEADING_ON.find(&sql[later.end..]) {
        let at = later.end + m.end();
        return format!("{}{} AND {}", &sql[..at], predicate, &sql[at..]);
    }

    if let Some(m) = WHERE_KEYWORD.find(sql) {
        return format!("{} {} AND{}", &sql[..m.end()], predicate, &sql[m.end()..]);
    }

    match TAIL_CLAUSE.find(sql) {
        Some(m) => format!("{}WHERE {} {}", &sql[..m.start()], predicate, &sql[m.start()..]),
        None => format!("{} WHERE {}", sql.trim_end(), predicate),
    }
}

/// Drop doubled commas and commas left dangling before a clause or a closing paren.
pub fn collapse_commas(sql: &str) -> String {
    let out = REPEATED_COMMAS.replace_all(sql, ",");
    let out = COMMA_BEFORE_CLAUSE.replace_all(&out, "$1$2");
    let out = COMMA_BEFORE_PAREN.replace_all(&out, "$1)");
    TRAILING_COMMA.replace_all(&out, "").into_owned()
}
