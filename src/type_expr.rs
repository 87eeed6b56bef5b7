//! Type-string grammar.
//!
//! Declared field types arrive as source spellings such as `*model.User`,
//! `[]model.User`, `map[string]*model.User`, `Page[model.User]` or the fully
//! qualified `github.com/acme/shop/model.User`. [`parse_type`] turns a spelling into a
//! [`TypeExpr`] tree with a small recursive-descent parser so that nested generics and
//! multi-argument instantiations compose without any substring surgery.
//!
//! Grammar:
//!
//! ```text
//! type      := '*' type
//!            | '[' ']' type
//!            | '[' length ']' type
//!            | 'map' '[' type ']' type
//!            | 'chan' type | '<-' 'chan' type | 'chan' '<-' type
//!            | 'interface' '{' '}' | 'any'
//!            | 'struct' '{' '}'
//!            | named
//! named     := path-or-ident [ '[' type { ',' type } ']' ]
//! ```

use std::fmt;
use thiserror::Error;

/// Parsed type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// A (possibly qualified, possibly instantiated) named type.
    Named {
        /// Package alias (`model`) or full import path (`github.com/acme/model`).
        qualifier: Option<String>,
        name: String,
        args: Vec<TypeExpr>,
    },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array(String, Box<TypeExpr>),
    Map(Box<TypeExpr>, Box<TypeExpr>),
    Chan(Box<TypeExpr>),
    /// `interface{}` or `any`.
    Any,
    /// `struct{}`.
    EmptyStruct,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeParseError {
    #[error("unexpected end of type expression {0:?}")]
    UnexpectedEnd(String),
    #[error("unexpected {found:?} at offset {offset} in type expression {input:?}")]
    Unexpected {
        input: String,
        offset: usize,
        found: char,
    },
    #[error("unsupported type expression {0:?}")]
    Unsupported(String),
}

/// Parses a type spelling.
pub fn parse_type(input: &str) -> Result<TypeExpr, TypeParseError> {
    let mut parser = TypeParser {
        input,
        pos: 0,
    };
    let expr = parser.parse_type()?;
    parser.skip_ws();
    if let Some(found) = parser.peek() {
        return Err(parser.unexpected(found));
    }
    Ok(expr)
}

impl TypeExpr {
    pub fn named(qualifier: Option<&str>, name: &str) -> Self {
        TypeExpr::Named {
            qualifier: qualifier.map(str::to_string),
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    /// Strips every leading pointer.
    pub fn peel_pointers(&self) -> &TypeExpr {
        let mut current = self;
        while let TypeExpr::Pointer(inner) = current {
            current = inner;
        }
        current
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeExpr::Pointer(_))
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named {
                qualifier,
                name,
                args,
            } => {
                if let Some(qualifier) = qualifier {
                    write!(f, "{}.", qualifier)?;
                }
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "[")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, "]")?;
                }
                Ok(())
            }
            TypeExpr::Pointer(inner) => write!(f, "*{}", inner),
            TypeExpr::Slice(inner) => write!(f, "[]{}", inner),
            TypeExpr::Array(len, inner) => write!(f, "[{}]{}", len, inner),
            TypeExpr::Map(key, value) => write!(f, "map[{}]{}", key, value),
            TypeExpr::Chan(inner) => write!(f, "chan {}", inner),
            TypeExpr::Any => write!(f, "interface{{}}"),
            TypeExpr::EmptyStruct => write!(f, "struct{{}}"),
        }
    }
}

struct TypeParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), TypeParseError> {
        if self.eat(expected) {
            return Ok(());
        }
        match self.peek() {
            Some(found) => Err(self.unexpected(found)),
            None => Err(TypeParseError::UnexpectedEnd(self.input.to_string())),
        }
    }

    fn unexpected(&self, found: char) -> TypeParseError {
        TypeParseError::Unexpected {
            input: self.input.to_string(),
            offset: self.pos,
            found,
        }
    }

    fn starts_with_keyword(&self, keyword: &str) -> bool {
        let rest = &self.input[self.pos..];
        rest.starts_with(keyword)
            && !rest[keyword.len()..]
                .chars()
                .next()
                .map(is_path_char)
                .unwrap_or(false)
    }

    fn parse_type(&mut self) -> Result<TypeExpr, TypeParseError> {
        self.skip_ws();
        let Some(c) = self.peek() else {
            return Err(TypeParseError::UnexpectedEnd(self.input.to_string()));
        };

        match c {
            '*' => {
                self.pos += 1;
                Ok(TypeExpr::Pointer(Box::new(self.parse_type()?)))
            }
            '[' => {
                self.pos += 1;
                self.skip_ws();
                if self.eat(']') {
                    return Ok(TypeExpr::Slice(Box::new(self.parse_type()?)));
                }
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == ']' {
                        break;
                    }
                    self.pos += c.len_utf8();
                }
                let len = self.input[start..self.pos].trim().to_string();
                self.expect(']')?;
                Ok(TypeExpr::Array(len, Box::new(self.parse_type()?)))
            }
            '<' => {
                if self.input[self.pos..].starts_with("<-") {
                    self.pos += 2;
                    self.skip_ws();
                    if self.starts_with_keyword("chan") {
                        self.pos += 4;
                        return Ok(TypeExpr::Chan(Box::new(self.parse_type()?)));
                    }
                }
                Err(self.unexpected(c))
            }
            _ if self.starts_with_keyword("map") => {
                self.pos += 3;
                self.expect('[')?;
                let key = self.parse_type()?;
                self.expect(']')?;
                let value = self.parse_type()?;
                Ok(TypeExpr::Map(Box::new(key), Box::new(value)))
            }
            _ if self.starts_with_keyword("chan") => {
                self.pos += 4;
                self.skip_ws();
                if self.input[self.pos..].starts_with("<-") {
                    self.pos += 2;
                }
                Ok(TypeExpr::Chan(Box::new(self.parse_type()?)))
            }
            _ if self.starts_with_keyword("interface") => {
                self.pos += "interface".len();
                self.expect('{')?;
                if !self.eat('}') {
                    return Err(TypeParseError::Unsupported(self.input.to_string()));
                }
                Ok(TypeExpr::Any)
            }
            _ if self.starts_with_keyword("struct") => {
                self.pos += "struct".len();
                self.expect('{')?;
                if !self.eat('}') {
                    return Err(TypeParseError::Unsupported(self.input.to_string()));
                }
                Ok(TypeExpr::EmptyStruct)
            }
            _ if self.starts_with_keyword("func") => {
                Err(TypeParseError::Unsupported(self.input.to_string()))
            }
            _ if is_path_char(c) => self.parse_named(),
            _ => Err(self.unexpected(c)),
        }
    }

    fn parse_named(&mut self) -> Result<TypeExpr, TypeParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !is_path_char(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        let path = &self.input[start..self.pos];

        // The name is whatever follows the last dot; everything before is the qualifier,
        // which may itself be a dotted import path such as `github.com/acme/model`.
        let (qualifier, name) = match path.rfind('.') {
            Some(idx) => (Some(path[..idx].to_string()), path[idx + 1..].to_string()),
            None => (None, path.to_string()),
        };

        if name.is_empty() || qualifier.as_deref() == Some("") {
            return Err(TypeParseError::Unexpected {
                input: self.input.to_string(),
                offset: start,
                found: '.',
            });
        }

        if name == "any" && qualifier.is_none() {
            return Ok(TypeExpr::Any);
        }

        let mut args = Vec::new();
        if self.eat('[') {
            loop {
                args.push(self.parse_type()?);
                if self.eat(',') {
                    continue;
                }
                self.expect(']')?;
                break;
            }
        }

        Ok(TypeExpr::Named {
            qualifier,
            name,
            args,
        })
    }
}

fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '/' | '-' | '~')
}
