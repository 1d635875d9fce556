//! Email address syntax checks and normalization.
//!
//! Only syntax is checked; no DNS or deliverability lookups happen here. Messages are
//! returned verbatim to clients, so they are written for end users.

const MAX_ADDRESS_CHARS: usize = 254;
const MAX_LOCAL_CHARS: usize = 64;
const MAX_DOMAIN_CHARS: usize = 253;
const MAX_LABEL_CHARS: usize = 63;

/// Characters besides alphanumerics allowed unquoted before the `@`.
const LOCAL_SPECIALS: &str = "!#$%&'*+-/=?^_`{|}~.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmailError {
    #[error("The email address is not valid. It must have exactly one @-sign.")]
    AtSign,
    #[error("There must be something before the @-sign.")]
    EmptyLocalPart,
    #[error("There must be something after the @-sign.")]
    EmptyDomain,
    #[error("The email address is too long ({}).", too_many(.0))]
    TooLong(usize),
    #[error("The email address is too long before the @-sign ({}).", too_many(.0))]
    LocalPartTooLong(usize),
    #[error("The email address is too long after the @-sign.")]
    DomainTooLong,
    #[error("The email address contains invalid characters before the @-sign: {0}.")]
    LocalPartCharacters(String),
    #[error("The part after the @-sign contains invalid characters: {0}.")]
    DomainCharacters(String),
    #[error("An email address cannot start with a period.")]
    LeadingPeriod,
    #[error("An email address cannot have a period immediately before the @-sign.")]
    PeriodBeforeAt,
    #[error("An email address cannot have a period immediately after the @-sign.")]
    PeriodAfterAt,
    #[error("An email address cannot end with a period.")]
    TrailingPeriod,
    #[error("An email address cannot have two periods in a row.")]
    ConsecutivePeriods,
    #[error("An email address cannot have a hyphen immediately after the @-sign.")]
    HyphenAfterAt,
    #[error("An email address cannot end with a hyphen.")]
    TrailingHyphen,
    #[error(
        "After the @-sign, periods cannot be separated by so many characters ({}).",
        too_many(.0)
    )]
    LabelTooLong(usize),
    #[error("The part after the @-sign is not valid. It should have a period.")]
    MissingPeriod,
    #[error("The part after the @-sign is not valid. It is not within a valid top-level domain.")]
    NumericTopLevelDomain,
}

fn too_many(count: &usize) -> String {
    match count {
        1 => "1 character too many".to_string(),
        n => format!("{n} characters too many"),
    }
}

/// A syntactically valid address in normalized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidEmail {
    pub local_part: String,
    pub domain: String,
}

impl ValidEmail {
    pub fn normalized(&self) -> String {
        format!("{}@{}", self.local_part, self.domain)
    }
}

/// Validates `address` and returns its normalized form (domain lower-cased).
pub fn validate_email(address: &str) -> Result<ValidEmail, EmailError> {
    let (local_part, domain) = split_at_sign(address)?;

    let length = address.chars().count();
    if length > MAX_ADDRESS_CHARS {
        return Err(EmailError::TooLong(length - MAX_ADDRESS_CHARS));
    }

    validate_local_part(local_part)?;
    let domain = domain.to_lowercase();
    validate_domain(&domain)?;

    Ok(ValidEmail {
        local_part: local_part.to_string(),
        domain,
    })
}

fn split_at_sign(address: &str) -> Result<(&str, &str), EmailError> {
    let mut parts = address.split('@');
    let (Some(local_part), Some(domain), None) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(EmailError::AtSign);
    };

    if local_part.is_empty() {
        return Err(EmailError::EmptyLocalPart);
    }
    if domain.is_empty() {
        return Err(EmailError::EmptyDomain);
    }
    Ok((local_part, domain))
}

fn validate_local_part(local_part: &str) -> Result<(), EmailError> {
    let length = local_part.chars().count();
    if length > MAX_LOCAL_CHARS {
        return Err(EmailError::LocalPartTooLong(length - MAX_LOCAL_CHARS));
    }

    let invalid = invalid_characters(local_part, |c| {
        c.is_alphanumeric() || LOCAL_SPECIALS.contains(c)
    });
    if !invalid.is_empty() {
        return Err(EmailError::LocalPartCharacters(invalid));
    }

    if local_part.starts_with('.') {
        return Err(EmailError::LeadingPeriod);
    }
    if local_part.ends_with('.') {
        return Err(EmailError::PeriodBeforeAt);
    }
    if local_part.contains("..") {
        return Err(EmailError::ConsecutivePeriods);
    }
    Ok(())
}

fn validate_domain(domain: &str) -> Result<(), EmailError> {
    let invalid = invalid_characters(domain, |c| c.is_alphanumeric() || c == '-' || c == '.');
    if !invalid.is_empty() {
        return Err(EmailError::DomainCharacters(invalid));
    }

    if domain.starts_with('.') {
        return Err(EmailError::PeriodAfterAt);
    }
    if domain.starts_with('-') {
        return Err(EmailError::HyphenAfterAt);
    }
    if domain.ends_with('.') {
        return Err(EmailError::TrailingPeriod);
    }
    if domain.ends_with('-') {
        return Err(EmailError::TrailingHyphen);
    }
    if domain.contains("..") {
        return Err(EmailError::ConsecutivePeriods);
    }
    if domain.chars().count() > MAX_DOMAIN_CHARS {
        return Err(EmailError::DomainTooLong);
    }

    for label in domain.split('.') {
        let length = label.chars().count();
        if length > MAX_LABEL_CHARS {
            return Err(EmailError::LabelTooLong(length - MAX_LABEL_CHARS));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(EmailError::DomainCharacters("'-'".to_string()));
        }
    }

    let Some((_, top_level)) = domain.rsplit_once('.') else {
        return Err(EmailError::MissingPeriod);
    };
    if top_level.chars().all(|c| c.is_ascii_digit()) {
        return Err(EmailError::NumericTopLevelDomain);
    }
    Ok(())
}

/// Lists each offending character once, in order of appearance.
fn invalid_characters(part: &str, allowed: impl Fn(char) -> bool) -> String {
    let mut seen = Vec::new();
    for c in part.chars().filter(|c| !allowed(*c)) {
        if !seen.contains(&c) {
            seen.push(c);
        }
    }

    seen.into_iter()
        .map(|c| match c {
            ' ' => "SPACE".to_string(),
            '\t' => "TAB".to_string(),
            c if c.is_control() => format!("U+{:04X}", c as u32),
            c => format!("'{c}'"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
