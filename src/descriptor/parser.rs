//! Parser for the `func` signature grammar of the descriptor table.
//!
//! ```text
//! name[.overload](Type[(alias)][?] name[=default], ..., *, kwparam, ...) -> Returns
//! Returns := () | Type[(alias)] [name] | (Type [name], Type [name], ...)
//! ```

/// A parameter exactly as written, before any descriptor-level policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawParam {
    pub name: String,
    /// Type with alias annotation and `?` removed, e.g. `Tensor`, `int[2]`.
    pub ty: String,
    pub optional: bool,
    pub default: Option<String>,
    pub modifier: Option<String>,
    pub keyword_only: bool,
    pub list_size: Option<usize>,
}

/// A return value exactly as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRetval {
    pub name: Option<String>,
    pub ty: String,
    pub modifier: Option<String>,
}

/// A parsed `func` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSignature {
    pub name: String,
    pub params: Vec<RawParam>,
    pub retvals: Vec<RawRetval>,
}

pub fn parse_signature(text: &str) -> Result<ParsedSignature, String> {
    let parser = Parser::new(text);
    parser.parse()
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn parse(mut self) -> Result<ParsedSignature, String> {
        self.skip_whitespace();
        let name = self.read_name()?;
        let params_text = self.read_group('(', ')')?;

        self.skip_whitespace();
        if !self.text[self.pos..].starts_with("->") {
            return Err(format!(
                "Expected '->' after parameter list but found {:?}",
                self.current_char()
            ));
        }
        self.pos += 2;
        let returns_text = self.text[self.pos..].trim();
        if returns_text.is_empty() {
            return Err("Expected return type after '->'".to_string());
        }

        let params = parse_params(params_text)?;
        let retvals = parse_returns(returns_text)?;

        Ok(ParsedSignature {
            name: name.to_string(),
            params,
            retvals,
        })
    }

    fn current_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if !ch.is_whitespace() {
                break;
            }
            self.advance();
        }
    }

    fn read_name(&mut self) -> Result<&'a str, String> {
        let start = self.pos;
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                self.advance();
            } else {
                break;
            }
        }

        let name = &self.text[start..self.pos];
        if name.is_empty() {
            return Err(format!("Expected function name but found {:?}", self.current_char()));
        }
        if name.starts_with('.') || name.ends_with('.') || name.matches('.').count() > 1 {
            return Err(format!("Malformed overload name '{}'", name));
        }
        Ok(name)
    }

    /// Read a balanced `open ... close` group and return its inner text.
    fn read_group(&mut self, open: char, close: char) -> Result<&'a str, String> {
        if self.current_char() != Some(open) {
            return Err(format!("Expected '{}' but found {:?}", open, self.current_char()));
        }
        self.advance();
        let start = self.pos;
        let mut depth = 0usize;
        let mut quote = None;

        while let Some(ch) = self.current_char() {
            match (quote, ch) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"') | (None, '\'') => quote = Some(ch),
                (None, '(') | (None, '[') => depth += 1,
                (None, ')') | (None, ']') if depth > 0 => depth -= 1,
                (None, c) if c == close => {
                    let inner = &self.text[start..self.pos];
                    self.advance();
                    return Ok(inner);
                }
                _ => {}
            }
            self.advance();
        }

        Err(format!("Unbalanced '{}' in signature", open))
    }
}

/// Split on commas that are not nested in brackets, parentheses or quotes.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '(') | (None, '[') => depth += 1,
            (None, ')') | (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(text[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());

    if parts.len() == 1 && parts[0].is_empty() {
        Vec::new()
    } else {
        parts
    }
}

/// Split `Type rest` at the first whitespace outside an alias annotation or list size.
fn split_type(item: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (idx, ch) in item.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                let rest = item[idx..].trim();
                return if rest.is_empty() { None } else { Some((&item[..idx], rest)) };
            }
            _ => {}
        }
    }
    None
}

/// Strip an alias annotation: `Tensor(a!)[]` becomes (`Tensor[]`, `a!`).
fn extract_modifier(ty: &str) -> Result<(String, Option<String>), String> {
    let Some(open) = ty.find('(') else {
        return Ok((ty.to_string(), None));
    };
    let close = ty[open..]
        .find(')')
        .map(|offset| open + offset)
        .ok_or_else(|| format!("Unterminated alias annotation in '{}'", ty))?;

    let modifier = &ty[open + 1..close];
    let stripped = format!("{}{}", &ty[..open], &ty[close + 1..]);
    Ok((stripped, Some(modifier.to_string())))
}

fn list_size(ty: &str) -> Result<Option<usize>, String> {
    let Some(open) = ty.find('[') else {
        return Ok(None);
    };
    let inner = ty[open + 1..]
        .strip_suffix(']')
        .ok_or_else(|| format!("Malformed list type '{}'", ty))?;
    if inner.is_empty() {
        return Ok(None);
    }
    inner
        .parse()
        .map(Some)
        .map_err(|_| format!("Malformed list size in '{}'", ty))
}

fn parse_params(text: &str) -> Result<Vec<RawParam>, String> {
    let mut params = Vec::new();
    let mut keyword_only = false;

    for item in split_top_level(text) {
        if item == "*" {
            if keyword_only {
                return Err("Duplicate keyword-only marker '*'".to_string());
            }
            keyword_only = true;
            continue;
        }
        if item.is_empty() {
            return Err("Empty parameter".to_string());
        }

        let (ty, rest) = split_type(item).ok_or_else(|| format!("Parameter '{}' has no name", item))?;
        let (name, default) = match rest.split_once('=') {
            Some((name, default)) => (name.trim(), Some(default.trim().to_string())),
            None => (rest, None),
        };
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(format!("Invalid parameter name in '{}'", item));
        }

        let optional = ty.contains('?');
        let ty = ty.replace('?', "");
        let (ty, modifier) = extract_modifier(&ty)?;
        let list_size = list_size(&ty)?;

        params.push(RawParam {
            name: name.to_string(),
            ty,
            optional,
            default,
            modifier,
            keyword_only,
            list_size,
        });
    }

    Ok(params)
}

fn parse_returns(text: &str) -> Result<Vec<RawRetval>, String> {
    let items = if text.starts_with('(') {
        let inner = text
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| format!("Malformed return list '{}'", text))?;
        split_top_level(inner)
    } else {
        vec![text]
    };

    items
        .into_iter()
        .map(|item| {
            if item.is_empty() {
                return Err("Empty return value".to_string());
            }
            let (ty, name) = match split_type(item) {
                Some((ty, name)) if name.chars().all(|c| c.is_alphanumeric() || c == '_') => {
                    (ty, Some(name.to_string()))
                }
                Some(_) => return Err(format!("Malformed return value '{}'", item)),
                None => (item, None),
            };
            let (ty, modifier) = extract_modifier(ty)?;
            Ok(RawRetval { name, ty, modifier })
        })
        .collect()
}
