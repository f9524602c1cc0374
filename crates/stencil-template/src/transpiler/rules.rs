/*
 * rules.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The ordered rewrite-rule table.
//!
//! Every pattern is built from the delimiter pair and matched case
//! insensitively. Order matters: later rules see the output of earlier ones
//! (dotted access and loop tokens are rewritten inside directives before the
//! echo rules match them).

use fancy_regex::{Captures, Regex};

use crate::config::Delimiters;

/// One named rewrite rule.
pub struct Rule {
    pub name: &'static str,
    pattern: Regex,
    rewrite: fn(&Captures<'_>) -> String,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

impl Rule {
    fn new(
        name: &'static str,
        pattern: &str,
        rewrite: fn(&Captures<'_>) -> String,
    ) -> Result<Self, fancy_regex::Error> {
        Ok(Self {
            name,
            pattern: Regex::new(&format!("(?i){pattern}"))?,
            rewrite,
        })
    }

    /// Replace every non-overlapping match once. `None` when nothing matched.
    pub fn apply_once(&self, text: &str) -> Result<Option<String>, fancy_regex::Error> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut matched = false;
        for caps in self.pattern.captures_iter(text) {
            let caps = caps?;
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            out.push_str(&(self.rewrite)(&caps));
            last = whole.end();
            matched = true;
        }
        if !matched {
            return Ok(None);
        }
        out.push_str(&text[last..]);
        Ok(Some(out))
    }
}

/// Build the rule table for a delimiter pair.
pub fn rule_table(delimiters: &Delimiters) -> Result<Vec<Rule>, fancy_regex::Error> {
    let l = format!(r"{}\s*", fancy_regex::escape(&delimiters.left));
    let r = format!(r"\s*{}", fancy_regex::escape(&delimiters.right));
    // Any character that does not start the closing delimiter.
    let nr = format!(r"(?:(?!{r}).)");

    Ok(vec![
        Rule::new("comment", &format!(r"{l}\*([\s\S]+?)\*{r}"), |_| String::new())?,
        Rule::new("raw-echo", &format!(r"{l}~(.*?){r}"), |c| {
            code(&format!("echo {};", group(c, 1)))
        })?,
        Rule::new(
            "dotted-access",
            &format!(r#"({l}{nr}*?)(\$[\w"'\[\]]+?)\.(\w+)(.*?{r})"#),
            |c| {
                format!(
                    "{}{}['{}']{}",
                    group(c, 1),
                    group(c, 2),
                    group(c, 3),
                    group(c, 4)
                )
            },
        )?,
        Rule::new(
            "loop-token",
            &format!(r"({l}.*?)(\$(\w+)@(index|iteration|first|last|total))+(.*?{r})"),
            |c| {
                format!(
                    "{}{}{}",
                    group(c, 1),
                    loop_var(group(c, 3), &group(c, 4).to_ascii_lowercase()),
                    group(c, 5)
                )
            },
        )?,
        Rule::new(
            "object-property",
            &format!(r"{l}(\$[\w\-]+->[\w\-]+){r}"),
            |c| code(&format!("echo strval({});", group(c, 1))),
        )?,
        Rule::new(
            "nofilter",
            &format!(r#"{l}(\$[\$\w\."'\[\]]+?)\snofilter{r}"#),
            |c| code(&format!("echo strval({});", group(c, 1))),
        )?,
        Rule::new(
            "ternary",
            &format!(r#"{l}([\w\$\.\[\]='"\s]+)\?(.*?:.*?){r}"#),
            |c| code(&format!("echo strval({}?{});", group(c, 1), group(c, 2))),
        )?,
        Rule::new(
            "assignment",
            &format!(r#"{l}(\$[\$\w"'\[\]]+?)\s*=(.*?){r}"#),
            |c| code(&format!("{} ={};", group(c, 1), group(c, 2))),
        )?,
        Rule::new(
            "escaped-echo",
            &format!(r#"{l}(\$[\$\w\."'\[\]]+?){r}"#),
            |c| code(&format!("echo escape(strval({}));", group(c, 1))),
        )?,
        Rule::new("while", &format!(r"{l}while\s*(.+?){r}"), |c| {
            code(&format!("while ({}) :", group(c, 1)))
        })?,
        Rule::new("end-while", &format!(r"{l}/while{r}"), |_| code("endwhile;"))?,
        Rule::new("if", &format!(r"{l}if\s*(.+?){r}"), |c| {
            code(&format!("if ({}) :", group(c, 1)))
        })?,
        Rule::new("else-if", &format!(r"{l}else\s*if\s*(.+?){r}"), |c| {
            code(&format!("elseif ({}) :", group(c, 1)))
        })?,
        Rule::new("else", &format!(r"{l}else{r}"), |_| code("else :"))?,
        Rule::new("end-if", &format!(r"{l}/if{r}"), |_| code("endif;"))?,
        Rule::new("break", &format!(r"{l}break{r}"), |_| code("break;"))?,
        Rule::new("continue", &format!(r"{l}continue{r}"), |_| code("continue;"))?,
        Rule::new(
            "foreach",
            &format!(r#"{l}foreach\s*(\$[\$\w\."'\[\]]+?)\s*as(\s*)\$([\w"'\[\]]+?){r}"#),
            |c| {
                let subject = group(c, 1);
                let name = group(c, 3);
                foreach_block(subject, &format!("{subject} as ${name}"), name)
            },
        )?,
        Rule::new(
            "keyed-foreach",
            &format!(
                r#"{l}foreach\s*(\$[\$\w\."'\[\]]+?)\s*as\s*(\$[\w"'\[\]]+?)\s*=>\s*\$([\w"'\[\]]+?){r}"#
            ),
            |c| {
                let subject = group(c, 1);
                let name = group(c, 3);
                foreach_block(
                    subject,
                    &format!("{subject} as {} => ${name}", group(c, 2)),
                    name,
                )
            },
        )?,
        Rule::new("end-foreach", &format!(r"{l}/foreach{r}"), |_| {
            code("endforeach; endif;")
        })?,
        Rule::new("include", &format!(r"{l}include\s*file=(.+?){r}"), |c| {
            code(&format!("include {};", quote_bare_word(group(c, 1).trim())))
        })?,
    ])
}

fn group<'t>(caps: &Captures<'t>, i: usize) -> &'t str {
    caps.get(i).map_or("", |m| m.as_str())
}

/// Wrap statements in a code block.
pub(crate) fn code(statements: &str) -> String {
    format!("<?tpl {statements} ?>")
}

/// Name of the runtime variable holding `field` of the loop over `$name`.
pub fn loop_var(name: &str, field: &str) -> String {
    format!("$_foreach_{name}_{field}")
}

/// The guarded loop: emptiness check and counters before entry, then
/// index/iteration/first/last bookkeeping at the top of every iteration.
fn foreach_block(subject: &str, header: &str, name: &str) -> String {
    let counter = loop_var(name, "counter");
    let total = loop_var(name, "total");
    let index = loop_var(name, "index");
    let iteration = loop_var(name, "iteration");
    let first = loop_var(name, "first");
    let last = loop_var(name, "last");

    let prologue = code(&format!(
        "if (!empty({subject})) : {counter} = 0; {total} = count({subject});"
    ));
    let head = code(&format!("foreach ({header}) :"));
    let bookkeeping = code(&format!(
        "{index} = {counter}; {iteration} = {counter} + 1; {first} = ({counter} == 0); \
         {last} = ({counter} == {total} - 1); {counter} = {counter} + 1;"
    ));
    format!("{prologue}{head}{bookkeeping}")
}

/// Quote a bare word so it reaches the runtime as a string. Variables,
/// quoted strings, numbers and `true`/`false`/`null` pass through.
pub fn quote_bare_word(word: &str) -> String {
    let passthrough = word.starts_with(['$', '\'', '"', '(', '['])
        || crate::value::parse_numeric(word).is_some()
        || ["true", "false", "null"]
            .iter()
            .any(|k| word.eq_ignore_ascii_case(k));
    if passthrough {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}
