//! Inline XBRL transformation rules.
//!
//! iXBRL lets filers tag display text like `1,234.50` or `17 January 2022`;
//! the `format` attribute names a rule from a transformation rule registry
//! that maps the display text to the canonical XBRL value. Registries are
//! identified by namespace; SEC EDGAR accepts registries 2 through 4 plus
//! its own. Unknown registries and unknown rules fail loudly.

use crate::{Error, Result};

pub const ITR_2008_NS: &str = "http://www.xbrl.org/2008/inlineXBRL/transformation";
pub const ITR1_NS: &str = "http://www.xbrl.org/inlineXBRL/transformation/2010-04-20";
pub const ITR2_NS: &str = "http://www.xbrl.org/inlineXBRL/transformation/2011-07-31";
pub const ITR3_NS: &str = "http://www.xbrl.org/inlineXBRL/transformation/2015-02-26";
pub const ITR4_NS: &str = "http://www.xbrl.org/inlineXBRL/transformation/2020-02-12";

/// Applies the rule `format` from the registry identified by `namespace` to
/// a display value.
pub fn normalize(namespace: &str, format: &str, value: &str) -> Result<String> {
    let value = value.trim().to_lowercase();
    let unknown = || Error::Transform {
        format: format.to_string(),
        value: value.clone(),
    };
    let rule = match namespace {
        ITR_2008_NS | ITR1_NS => itr1_rule(format),
        ITR2_NS => itr2_rule(format),
        ITR3_NS => itr3_rule(format),
        ITR4_NS => itr4_rule(format),
        _ => None,
    }
    .ok_or_else(unknown)?;
    rule(&value).ok_or_else(unknown)
}

pub fn is_known_registry(namespace: &str) -> bool {
    matches!(namespace, ITR_2008_NS | ITR1_NS | ITR2_NS | ITR3_NS | ITR4_NS)
}

type Rule = fn(&str) -> Option<String>;

fn itr1_rule(format: &str) -> Option<Rule> {
    Some(match format {
        "datedoteu" | "dateslasheu" => date_day_month_year,
        "datedotus" | "dateslashus" => date_month_day_year,
        "datelonguk" | "dateshortuk" => date_day_month_year_en,
        "datelongus" | "dateshortus" => date_month_day_year_en,
        "datelongdaymonthuk" | "dateshortdaymonthuk" => date_day_month_en,
        "datelongmonthdayus" | "dateshortmonthdayus" => date_month_day_en,
        "dateslashdaymontheu" => date_day_month,
        "dateslashmonthdayus" => date_month_day,
        "datelongyearmonth" | "dateshortyearmonth" => date_year_month_en,
        "datelongmonthyear" | "dateshortmonthyear" => date_month_year_en,
        "numcomma" | "numdotcomma" | "numspacecomma" => num_comma_decimal,
        "numcommadot" | "numspacedot" => num_dot_decimal,
        "numdash" => fixed_zero,
        _ => return None,
    })
}

fn itr2_rule(format: &str) -> Option<Rule> {
    Some(match format {
        "booleanfalse" => fixed_false,
        "booleantrue" => fixed_true,
        "datedaymonth" => date_day_month,
        "datedaymonthen" => date_day_month_en,
        "datedaymonthyear" => date_day_month_year,
        "datedaymonthyearen" => date_day_month_year_en,
        "datemonthday" => date_month_day,
        "datemonthdayen" => date_month_day_en,
        "datemonthdayyear" => date_month_day_year,
        "datemonthdayyearen" => date_month_day_year_en,
        "datemonthyearen" => date_month_year_en,
        "dateyearmonthen" => date_year_month_en,
        "nocontent" => fixed_empty,
        "numcommadecimal" => num_comma_decimal,
        "numdotdecimal" => num_dot_decimal,
        "zerodash" => fixed_zero,
        _ => return None,
    })
}

fn itr3_rule(format: &str) -> Option<Rule> {
    Some(match format {
        "booleanfalse" => fixed_false,
        "booleantrue" => fixed_true,
        "datedaymonth" => date_day_month,
        "datedaymonthen" => date_day_month_en,
        "datedaymonthyear" => date_day_month_year,
        "datedaymonthyearen" => date_day_month_year_en,
        "datemonthday" => date_month_day,
        "datemonthdayen" => date_month_day_en,
        "datemonthdayyear" => date_month_day_year,
        "datemonthdayyearen" => date_month_day_year_en,
        "datemonthyear" => date_month_year,
        "datemonthyearen" => date_month_year_en,
        "dateyearmonthday" => date_year_month_day,
        "dateyearmonthen" => date_year_month_en,
        "nocontent" => fixed_empty,
        "numcommadecimal" => num_comma_decimal,
        "numdotdecimal" => num_dot_decimal,
        "zerodash" => fixed_zero,
        _ => return None,
    })
}

fn itr4_rule(format: &str) -> Option<Rule> {
    Some(match format {
        "date-day-month" => date_day_month,
        "date-day-month-year" => date_day_month_year,
        "date-day-monthname-en" => date_day_month_en,
        "date-day-monthname-year-en" => date_day_month_year_en,
        "date-month-day" => date_month_day,
        "date-month-day-year" => date_month_day_year,
        "date-month-year" => date_month_year,
        "date-monthname-day-en" => date_month_day_en,
        "date-monthname-day-year-en" => date_month_day_year_en,
        "date-year-month" => date_year_month,
        "date-year-month-day" => date_year_month_day,
        "date-year-monthname-en" => date_year_month_en,
        "fixed-empty" => fixed_empty,
        "fixed-false" => fixed_false,
        "fixed-true" => fixed_true,
        "fixed-zero" => fixed_zero,
        "num-comma-decimal" => num_comma_decimal,
        "num-dot-decimal" => num_dot_decimal,
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// rule implementations
// ---------------------------------------------------------------------------

fn fixed_zero(_: &str) -> Option<String> {
    Some("0".into())
}

fn fixed_empty(_: &str) -> Option<String> {
    Some(String::new())
}

fn fixed_true(_: &str) -> Option<String> {
    Some("true".into())
}

fn fixed_false(_: &str) -> Option<String> {
    Some("false".into())
}

/// `nnn,nnn,nnn.n` -> `nnnnnnnnn.n`: strip everything but digits and the
/// dot decimal separator.
fn num_dot_decimal(value: &str) -> Option<String> {
    let out: String = value.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    if out.is_empty() {
        return None;
    }
    Some(out)
}

/// `nnn.nnn.nnn,n` -> `nnnnnnnnn.n`: the comma is the decimal separator.
fn num_comma_decimal(value: &str) -> Option<String> {
    let out: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if out.is_empty() {
        return None;
    }
    Some(out)
}

/// Runs of non-digit characters split the value into numeric segments.
fn digit_segments(value: &str) -> Vec<&str> {
    value
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Splits at characters that are neither digits nor letters, for formats
/// carrying month names.
fn token_segments(value: &str) -> Vec<&str> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect()
}

fn month_number(name: &str) -> Option<&'static str> {
    Some(match name {
        "jan" | "january" => "01",
        "feb" | "february" => "02",
        "mar" | "march" => "03",
        "apr" | "april" => "04",
        "may" => "05",
        "jun" | "june" => "06",
        "jul" | "july" => "07",
        "aug" | "august" => "08",
        "sep" | "sept" | "september" => "09",
        "oct" | "october" => "10",
        "nov" | "november" => "11",
        "dec" | "december" => "12",
        _ => return None,
    })
}

/// Two-digit years widen on a 1955 pivot, four-digit years pass through.
fn widen_year(year: &str) -> Option<String> {
    match year.len() {
        4 => Some(year.to_string()),
        2 => {
            let n: u32 = year.parse().ok()?;
            Some(if n > 55 {
                format!("19{year}")
            } else {
                format!("20{year}")
            })
        }
        _ => None,
    }
}

fn pad2(s: &str) -> String {
    if s.len() == 1 {
        format!("0{s}")
    } else {
        s.to_string()
    }
}

/// `(D)D*(M)M` -> `--MM-DD`
fn date_day_month(value: &str) -> Option<String> {
    let seg = digit_segments(value);
    let [day, month] = seg[..] else { return None };
    Some(format!("--{}-{}", pad2(month), pad2(day)))
}

/// `(D)D*Mon(th)` -> `--MM-DD`
fn date_day_month_en(value: &str) -> Option<String> {
    let seg = token_segments(value);
    let [day, month] = seg[..] else { return None };
    Some(format!("--{}-{}", month_number(month)?, pad2(day)))
}

/// `(D)D*(M)M*(Y)Y(YY)` -> `YYYY-MM-DD`
fn date_day_month_year(value: &str) -> Option<String> {
    let seg = digit_segments(value);
    let [day, month, year] = seg[..] else { return None };
    Some(format!("{}-{}-{}", widen_year(year)?, pad2(month), pad2(day)))
}

/// `(D)D*Mon(th)*(Y)Y(YY)` -> `YYYY-MM-DD`
fn date_day_month_year_en(value: &str) -> Option<String> {
    let seg = token_segments(value);
    let [day, month, year] = seg[..] else { return None };
    Some(format!(
        "{}-{}-{}",
        widen_year(year)?,
        month_number(month)?,
        pad2(day)
    ))
}

fn date_month_day(value: &str) -> Option<String> {
    let seg = digit_segments(value);
    let [month, day] = seg[..] else { return None };
    Some(format!("--{}-{}", pad2(month), pad2(day)))
}

fn date_month_day_en(value: &str) -> Option<String> {
    let seg = token_segments(value);
    let [month, day] = seg[..] else { return None };
    Some(format!("--{}-{}", month_number(month)?, pad2(day)))
}

fn date_month_day_year(value: &str) -> Option<String> {
    let seg = digit_segments(value);
    let [month, day, year] = seg[..] else { return None };
    Some(format!("{}-{}-{}", widen_year(year)?, pad2(month), pad2(day)))
}

/// `Mon(th)*(D)D*(Y)Y(YY)` -> `YYYY-MM-DD`, e.g. `September 26, 2020`.
fn date_month_day_year_en(value: &str) -> Option<String> {
    let seg = token_segments(value);
    let [month, day, year] = seg[..] else { return None };
    Some(format!(
        "{}-{}-{}",
        widen_year(year)?,
        month_number(month)?,
        pad2(day)
    ))
}

fn date_month_year(value: &str) -> Option<String> {
    let seg = digit_segments(value);
    let [month, year] = seg[..] else { return None };
    Some(format!("{}-{}", widen_year(year)?, pad2(month)))
}

fn date_month_year_en(value: &str) -> Option<String> {
    let seg = token_segments(value);
    let [month, year] = seg[..] else { return None };
    Some(format!("{}-{}", widen_year(year)?, month_number(month)?))
}

fn date_year_month(value: &str) -> Option<String> {
    let seg = digit_segments(value);
    let [year, month] = seg[..] else { return None };
    Some(format!("{}-{}", widen_year(year)?, pad2(month)))
}

fn date_year_month_day(value: &str) -> Option<String> {
    let seg = digit_segments(value);
    let [year, month, day] = seg[..] else { return None };
    Some(format!("{}-{}-{}", widen_year(year)?, pad2(month), pad2(day)))
}

fn date_year_month_en(value: &str) -> Option<String> {
    let seg = token_segments(value);
    let [year, month] = seg[..] else { return None };
    Some(format!("{}-{}", widen_year(year)?, month_number(month)?))
}
