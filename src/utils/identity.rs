use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// 用于去重的逻辑身份字段（按优先级排列）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    Email,
    Phone,
}

impl IdentityField {
    pub const PRIORITY: [IdentityField; 2] = [IdentityField::Email, IdentityField::Phone];

    /// 表单字段名的候选写法，已归一化（小写、去掉空白/下划线/连字符/点）
    fn candidates(self) -> &'static [&'static str] {
        match self {
            IdentityField::Email => &[
                "email",
                "emailaddress",
                "mail",
                "correo",
                "correoelectronico",
            ],
            IdentityField::Phone => &[
                "phone",
                "phonenumber",
                "mobile",
                "telephone",
                "telefone",
                "telefono",
                "celular",
                "whatsapp",
            ],
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            IdentityField::Email => "email",
            IdentityField::Phone => "phone",
        }
    }

    fn matches(self, field_name: &str) -> Option<usize> {
        let normalized = normalize_field_name(field_name);
        self.candidates().iter().position(|c| *c == normalized)
    }

    fn normalize_value(self, raw: &str) -> Option<String> {
        match self {
            IdentityField::Email => normalize_email(raw),
            IdentityField::Phone => normalize_phone(raw),
        }
    }
}

/// 用于去重的归一化身份，例如 `email:ana@example.com`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn new(field: IdentityField, normalized_value: &str) -> Self {
        Self(format!("{}:{}", field.prefix(), normalized_value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// "E-mail", "e_mail", " Email " -> "email"
pub fn normalize_field_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '_' | '-' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
    })
}

pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    email_regex().is_match(&email).then_some(email)
}

/// 仅保留数字，至少 8 位
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() >= 8).then_some(digits)
}

/// 解析活动表单中哪些字段承载参与者身份
///
/// 每个表单定义构建一次：按候选写法匹配表单声明的字段名，
/// 读取提交数据时优先走已解析的键，表单未声明时再扫描提交数据的键。
/// 邮箱字段有值时只以邮箱为准（格式不合法即无身份），不会退回到手机号。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityResolver {
    resolved: Vec<(IdentityField, String)>,
}

impl IdentityResolver {
    pub fn from_form_fields(form_fields: &[String]) -> Self {
        let mut resolved = Vec::new();
        for field in IdentityField::PRIORITY {
            let best = form_fields
                .iter()
                .filter_map(|name| field.matches(name).map(|rank| (rank, name)))
                .min_by_key(|(rank, _)| *rank);
            if let Some((_, name)) = best {
                resolved.push((field, name.clone()));
            }
        }
        Self { resolved }
    }

    pub fn resolved_fields(&self) -> &[(IdentityField, String)] {
        &self.resolved
    }

    pub fn extract(&self, data: &Map<String, Value>) -> Option<IdentityKey> {
        for field in IdentityField::PRIORITY {
            if let Some(value) = self.submitted_value(field, data) {
                return identity_from_value(field, value);
            }
        }
        None
    }

    /// 某个身份字段提交的非空值
    fn submitted_value<'a>(
        &self,
        field: IdentityField,
        data: &'a Map<String, Value>,
    ) -> Option<&'a Value> {
        let declared = self
            .resolved
            .iter()
            .filter(|(f, _)| *f == field)
            .find_map(|(_, key)| data.get(key).or_else(|| lookup_case_insensitive(data, key)))
            .filter(|v| is_filled(v));
        if declared.is_some() {
            return declared;
        }

        // 表单未声明字段时，直接扫描提交数据的键
        data.iter()
            .filter(|(_, v)| is_filled(v))
            .filter_map(|(name, v)| field.matches(name).map(|rank| (rank, v)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, v)| v)
    }
}

fn is_filled(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.trim().is_empty(),
        Value::Number(_) => true,
        _ => false,
    }
}

fn lookup_case_insensitive<'a>(data: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let wanted = normalize_field_name(key);
    data.iter()
        .find(|(name, _)| normalize_field_name(name) == wanted)
        .map(|(_, v)| v)
}

fn identity_from_value(field: IdentityField, value: &Value) -> Option<IdentityKey> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    field
        .normalize_value(&raw)
        .map(|normalized| IdentityKey::new(field, &normalized))
}
