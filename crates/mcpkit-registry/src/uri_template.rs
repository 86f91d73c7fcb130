//! A hand-rolled RFC 6570 subset: level-1 path expansion (`{var}`) and
//! level-3 form-style query expansion (`{?a,b,c}`). No regex, no external
//! uri-template crate — the pattern is a flat char walk, matching how
//! small the grammar we actually need is.

use std::collections::HashMap;
use std::fmt;

use percent_encoding::percent_decode_str;

#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    Literal(String),
    Variable(String),
}

/// A compiled URI template: a literal/variable path plus an optional
/// trailing form-style query expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct UriTemplate {
    template: String,
    path: Vec<PathSegment>,
    query_vars: Vec<String>,
    variables: Vec<String>,
}

/// The result of matching a concrete URI against a [`UriTemplate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriMatch {
    pub parameters: HashMap<String, String>,
}

impl UriTemplate {
    /// Parse a template string. `{name}` introduces a required path
    /// variable; a single trailing `{?a,b,c}` introduces optional query
    /// variables.
    pub fn parse(template: &str) -> Result<Self, UriTemplateError> {
        if template.is_empty() {
            return Err(UriTemplateError::EmptyTemplate);
        }

        let mut path = Vec::new();
        let mut variables = Vec::new();
        let mut query_vars = Vec::new();
        let mut chars = template.chars().peekable();
        let mut literal = String::new();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'?') => {
                    chars.next(); // consume '?'
                    if !literal.is_empty() {
                        path.push(PathSegment::Literal(std::mem::take(&mut literal)));
                    }
                    let mut found_closing = false;
                    let mut name = String::new();
                    for qc in chars.by_ref() {
                        match qc {
                            '}' => {
                                found_closing = true;
                                break;
                            }
                            ',' => {
                                if name.is_empty() {
                                    return Err(UriTemplateError::EmptyVariable);
                                }
                                query_vars.push(std::mem::take(&mut name));
                            }
                            c if c.is_alphanumeric() || c == '_' => name.push(c),
                            c => return Err(UriTemplateError::InvalidVariableName(c.to_string())),
                        }
                    }
                    if !found_closing {
                        return Err(UriTemplateError::UnclosedVariable(name));
                    }
                    if name.is_empty() {
                        return Err(UriTemplateError::EmptyVariable);
                    }
                    query_vars.push(name);
                    if chars.peek().is_some() {
                        return Err(UriTemplateError::QueryExpansionMustBeTrailing);
                    }
                }
                '{' => {
                    if !literal.is_empty() {
                        path.push(PathSegment::Literal(std::mem::take(&mut literal)));
                    }
                    let mut name = String::new();
                    let mut found_closing = false;
                    for vc in chars.by_ref() {
                        if vc == '}' {
                            found_closing = true;
                            break;
                        }
                        if vc.is_alphanumeric() || vc == '_' {
                            name.push(vc);
                        } else {
                            return Err(UriTemplateError::InvalidVariableName(name));
                        }
                    }
                    if !found_closing {
                        return Err(UriTemplateError::UnclosedVariable(name));
                    }
                    if name.is_empty() {
                        return Err(UriTemplateError::EmptyVariable);
                    }
                    variables.push(name.clone());
                    path.push(PathSegment::Variable(name));
                }
                '}' => return Err(UriTemplateError::UnexpectedCloseBrace),
                _ => literal.push(ch),
            }
        }

        if !literal.is_empty() {
            path.push(PathSegment::Literal(literal));
        }

        variables.extend(query_vars.iter().cloned());

        Ok(UriTemplate {
            template: template.to_string(),
            path,
            query_vars,
            variables,
        })
    }

    /// Match a concrete URI against this template, extracting path and
    /// query variables. Query variables are optional: a template
    /// declaring `{?a,b}` still matches a URI supplying only `a`.
    pub fn matches(&self, uri: &str) -> Option<UriMatch> {
        let (path_part, query_part) = match uri.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (uri, None),
        };

        let uri_parts: Vec<&str> = path_part.split('/').filter(|s| !s.is_empty()).collect();

        let mut template_parts = Vec::new();
        for segment in &self.path {
            match segment {
                PathSegment::Literal(lit) => {
                    for part in lit.split('/') {
                        if !part.is_empty() {
                            template_parts.push(TemplatePart::Literal(part));
                        }
                    }
                }
                PathSegment::Variable(name) => template_parts.push(TemplatePart::Variable(name)),
            }
        }

        if uri_parts.len() != template_parts.len() {
            return None;
        }

        let mut parameters = HashMap::new();
        for (uri_part, template_part) in uri_parts.iter().zip(template_parts.iter()) {
            match template_part {
                TemplatePart::Variable(name) => {
                    let decoded = percent_decode_str(uri_part).decode_utf8_lossy().into_owned();
                    parameters.insert((*name).to_string(), decoded);
                }
                TemplatePart::Literal(lit) => {
                    if uri_part != lit {
                        return None;
                    }
                }
            }
        }

        if let Some(query) = query_part {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                if self.query_vars.iter().any(|v| v == key) {
                    let decoded = percent_decode_str(value).decode_utf8_lossy().into_owned();
                    parameters.insert(key.to_string(), decoded);
                }
            }
        }

        Some(UriMatch { parameters })
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn is_parameterized(&self) -> bool {
        !self.variables.is_empty()
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Derive a human-readable title from the template shape, e.g.
    /// `docs://content/{name}` -> `"Docs Content"`.
    pub fn generate_name(&self) -> String {
        let mut words = Vec::new();
        let mut current = String::new();
        let mut in_var = false;

        for ch in self.template.chars() {
            match ch {
                '{' => {
                    if !current.is_empty() {
                        words.push(std::mem::take(&mut current));
                    }
                    in_var = true;
                }
                '}' => {
                    in_var = false;
                    current.clear();
                }
                '/' | '-' | '_' | ':' | '?' | ',' => {
                    if !in_var && !current.is_empty() {
                        words.push(std::mem::take(&mut current));
                    }
                }
                c if c.is_alphanumeric() && !in_var => current.push(c),
                _ => {}
            }
        }
        if !current.is_empty() {
            words.push(current);
        }

        words
            .into_iter()
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    None => String::new(),
                    Some(first) => {
                        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                    }
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

enum TemplatePart<'a> {
    Literal(&'a str),
    Variable(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UriTemplateError {
    EmptyTemplate,
    InvalidVariableName(String),
    UnclosedVariable(String),
    EmptyVariable,
    UnexpectedCloseBrace,
    QueryExpansionMustBeTrailing,
}

impl fmt::Display for UriTemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UriTemplateError::EmptyTemplate => write!(f, "URI template cannot be empty"),
            UriTemplateError::InvalidVariableName(name) => {
                write!(f, "invalid variable name: {name}")
            }
            UriTemplateError::UnclosedVariable(name) => write!(f, "unclosed variable: {{{name}"),
            UriTemplateError::EmptyVariable => write!(f, "empty variable name: {{}}"),
            UriTemplateError::UnexpectedCloseBrace => {
                write!(f, "unexpected closing brace without opening")
            }
            UriTemplateError::QueryExpansionMustBeTrailing => {
                write!(f, "{{?...}} query expansion must be the final template segment")
            }
        }
    }
}

impl std::error::Error for UriTemplateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_variable_matches() {
        let template = UriTemplate::parse("resource://mcp/user/{id}").unwrap();
        let m = template.matches("resource://mcp/user/42").unwrap();
        assert_eq!(m.parameters.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn literal_template_requires_exact_match() {
        let template = UriTemplate::parse("docs://list").unwrap();
        assert!(!template.is_parameterized());
        assert!(template.matches("docs://other").is_none());
        assert!(template.matches("docs://list").unwrap().parameters.is_empty());
    }

    #[test]
    fn query_expansion_is_optional() {
        let template = UriTemplate::parse("search://results{?q,page}").unwrap();
        assert_eq!(template.variables(), &["q", "page"]);

        let with_both = template.matches("search://results?q=rust&page=2").unwrap();
        assert_eq!(with_both.parameters.get("q"), Some(&"rust".to_string()));
        assert_eq!(with_both.parameters.get("page"), Some(&"2".to_string()));

        let with_one = template.matches("search://results?q=rust").unwrap();
        assert_eq!(with_one.parameters.get("q"), Some(&"rust".to_string()));
        assert!(!with_one.parameters.contains_key("page"));

        let with_none = template.matches("search://results").unwrap();
        assert!(with_none.parameters.is_empty());
    }

    #[test]
    fn percent_decodes_path_and_query_values() {
        let template = UriTemplate::parse("docs://content/{name}{?tag}").unwrap();
        let m = template
            .matches("docs://content/hello%20world?tag=a%2Bb")
            .unwrap();
        assert_eq!(m.parameters.get("name"), Some(&"hello world".to_string()));
        assert_eq!(m.parameters.get("tag"), Some(&"a+b".to_string()));
    }

    #[test]
    fn generate_name_title_cases_segments() {
        let template = UriTemplate::parse("docs://content/{name}").unwrap();
        assert_eq!(template.generate_name(), "Docs Content");
    }

    #[test]
    fn query_expansion_must_be_trailing() {
        let err = UriTemplate::parse("docs://{?q}/more").unwrap_err();
        assert_eq!(err, UriTemplateError::QueryExpansionMustBeTrailing);
    }
}
