//! 请求校验
//!
//! 所有字段都会被检查，错误按字段声明顺序收集后一次性返回，
//! 不会在第一个错误处中断。

use std::num::NonZeroUsize;

use domain::{DisplayName, MessageKind, Recipient, BROADCAST_TOKEN};
use serde::Deserialize;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::ApplicationError;

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct JoinRequest {
    #[validate(
        required(message = "\"name\" is required"),
        length(min = 1, message = "\"name\" is not allowed to be empty"),
        custom(function = "unreserved_name")
    )]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(
        required(message = "\"to\" is required"),
        length(min = 1, message = "\"to\" is not allowed to be empty")
    )]
    pub to: Option<String>,
    #[validate(
        required(message = "\"text\" is required"),
        length(min = 1, message = "\"text\" is not allowed to be empty")
    )]
    pub text: Option<String>,
    #[serde(rename = "type")]
    #[validate(
        required(message = "\"type\" is required"),
        custom(function = "user_authored_kind")
    )]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMessage {
    pub to: Recipient,
    pub text: String,
    pub kind: MessageKind,
}

#[allow(clippy::ptr_arg)]
fn user_authored_kind(value: &String) -> Result<(), ValidationError> {
    match value.parse::<MessageKind>() {
        Ok(kind) if kind.is_user_authored() => Ok(()),
        _ => Err(ValidationError::new("kind")
            .with_message("\"type\" must be one of [message, private_message]".into())),
    }
}

#[allow(clippy::ptr_arg)]
fn unreserved_name(value: &String) -> Result<(), ValidationError> {
    if DisplayName::is_reserved(value) {
        return Err(ValidationError::new("reserved")
            .with_message(format!("\"name\" must not be {BROADCAST_TOKEN}").into()));
    }
    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned())
}

fn collect(errors: &ValidationErrors, fields: &[&str]) -> Vec<String> {
    let by_field = errors.field_errors();
    fields
        .iter()
        .filter_map(|field| by_field.get(*field))
        .flat_map(|errors| errors.iter())
        .map(|error| match &error.message {
            Some(message) => message.to_string(),
            None => format!("invalid value ({})", error.code),
        })
        .collect()
}

pub fn validate_join(request: JoinRequest) -> Result<DisplayName, ApplicationError> {
    let request = JoinRequest {
        name: trimmed(request.name),
    };
    request
        .validate()
        .map_err(|errors| ApplicationError::ValidationFailed(collect(&errors, &["name"])))?;

    let name = request.name.unwrap_or_default();
    Ok(DisplayName::parse(name)?)
}

pub fn validate_message(request: SendMessageRequest) -> Result<ValidatedMessage, ApplicationError> {
    let request = SendMessageRequest {
        to: trimmed(request.to),
        text: trimmed(request.text),
        kind: trimmed(request.kind),
    };
    request.validate().map_err(|errors| {
        // `type` 字段在错误表中可能以 serde 重命名后的名字出现
        ApplicationError::ValidationFailed(collect(&errors, &["to", "text", "type", "kind"]))
    })?;

    let kind = request.kind.unwrap_or_default().parse::<MessageKind>()?;
    Ok(ValidatedMessage {
        to: Recipient::parse(request.to.unwrap_or_default())?,
        text: request.text.unwrap_or_default(),
        kind,
    })
}

/// 身份请求头缺失或为空都视为未提供身份
pub fn validate_sender_header(value: Option<&str>) -> Result<DisplayName, ApplicationError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(DisplayName::parse(value)?),
        _ => Err(ApplicationError::MissingIdentity),
    }
}

/// 非正整数或无法解析的值都视为不限制
pub fn parse_limit(value: Option<&str>) -> Option<NonZeroUsize> {
    value.and_then(|v| v.trim().parse::<NonZeroUsize>().ok())
}
