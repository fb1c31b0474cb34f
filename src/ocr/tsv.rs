//! Parsing of Tesseract's TSV output.
//!
//! Columns: level, page_num, block_num, par_num, line_num, word_num,
//! left, top, width, height, conf, text. Level 4 rows are text lines and
//! level 5 rows are words.

use super::backend::{Recognition, Region};

const LEVEL_LINE: u32 = 4;
const LEVEL_WORD: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
struct TsvRow {
    level: u32,
    block: u32,
    par: u32,
    line: u32,
    region: Region,
    conf: f64,
    text: String,
}

fn parse_rows(tsv: &str) -> Vec<TsvRow> {
    tsv.lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.splitn(12, '\t').collect();
            if cols.len() < 11 {
                return None;
            }
            // Header and malformed rows fail to parse and are dropped.
            let num = |i: usize| cols[i].trim().parse::<u32>().ok();
            let region = Region::new(num(6)?, num(7)?, num(8)?, num(9)?);
            Some(TsvRow {
                level: num(0)?,
                block: num(2)?,
                par: num(3)?,
                line: num(4)?,
                region,
                conf: cols[10].trim().parse::<f64>().ok()?,
                text: cols.get(11).map(|t| t.trim_end_matches('\r')).unwrap_or("").to_string(),
            })
        })
        .collect()
}

/// Rebuild text and mean word confidence from TSV output.
///
/// Words on a line are joined by spaces, lines by a newline, and a new
/// paragraph or block starts after a blank line. Only words with a
/// non-negative confidence and non-blank text count toward the mean; with
/// no such words the confidence is 0.
pub fn parse_recognition(tsv: &str) -> Recognition {
    let mut text = String::new();
    let mut last: Option<(u32, u32, u32)> = None;
    let mut conf_sum = 0.0;
    let mut conf_count = 0usize;

    for row in parse_rows(tsv).into_iter().filter(|r| r.level == LEVEL_WORD) {
        let word = row.text.trim();
        if word.is_empty() || row.conf < 0.0 {
            continue;
        }

        let key = (row.block, row.par, row.line);
        match last {
            None => {}
            Some((block, par, _)) if block != row.block || par != row.par => text.push_str("\n\n"),
            Some((_, _, line)) if line != row.line => text.push('\n'),
            Some(_) => text.push(' '),
        }
        last = Some(key);

        text.push_str(word);
        conf_sum += row.conf;
        conf_count += 1;
    }

    let confidence = if conf_count == 0 {
        0.0
    } else {
        conf_sum / conf_count as f64
    };
    Recognition { text, confidence }
}

/// Text-line regions from TSV output, in reading order.
pub fn line_regions(tsv: &str) -> Vec<Region> {
    parse_rows(tsv)
        .into_iter()
        .filter(|r| r.level == LEVEL_LINE && !r.region.is_empty())
        .map(|r| r.region)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t2550\t3300\t-1\t
2\t1\t1\t0\t0\t0\t100\t100\t800\t120\t-1\t
3\t1\t1\t1\t0\t0\t100\t100\t800\t120\t-1\t
4\t1\t1\t1\t1\t0\t100\t100\t800\t50\t-1\t
5\t1\t1\t1\t1\t1\t100\t100\t200\t50\t90\tSubject
5\t1\t1\t1\t1\t2\t320\t100\t300\t50\t80\t094-000123
4\t1\t1\t1\t2\t0\t100\t170\t600\t50\t-1\t
5\t1\t1\t1\t2\t1\t100\t170\t600\t50\t70\tVisit
2\t1\t2\t0\t0\t0\t100\t400\t800\t50\t-1\t
3\t1\t2\t1\t0\t0\t100\t400\t800\t50\t-1\t
4\t1\t2\t1\t1\t0\t100\t400\t800\t50\t-1\t
5\t1\t2\t1\t1\t1\t100\t400\t200\t50\t60\tSigned
5\t1\t2\t1\t1\t2\t320\t400\t200\t50\t-1\t
";

    #[test]
    fn test_parse_recognition_rebuilds_layout() {
        let rec = parse_recognition(SAMPLE);
        assert_eq!(rec.text, "Subject 094-000123\nVisit\n\nSigned");
        assert!((rec.confidence - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_recognition_without_words_is_zero() {
        let header_only = SAMPLE.lines().next().unwrap();
        let rec = parse_recognition(header_only);
        assert_eq!(rec.text, "");
        assert_eq!(rec.confidence, 0.0);
        assert!(!rec.has_content());
    }

    #[test]
    fn test_line_regions_from_level_four_rows() {
        let regions = line_regions(SAMPLE);
        assert_eq!(
            regions,
            vec![
                Region::new(100, 100, 800, 50),
                Region::new(100, 170, 600, 50),
                Region::new(100, 400, 800, 50),
            ]
        );
    }
}
