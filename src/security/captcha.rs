use rand::Rng;
use rocket::http::{Cookie, CookieJar, SameSite};
use serde_json::Value;
use std::collections::HashMap;

use crate::models::settings::is_truthy;

const MATH_COOKIE: &str = "loanflow_captcha";
const MATH_MAX_AGE_SECS: i64 = 300;

/// Captcha settings as configured under System Settings.
#[derive(Debug, Clone)]
pub struct CaptchaConfig {
    pub enabled: bool,
    pub provider: String,
    pub site_key: String,
    pub secret_key: String,
    pub protected_forms: Vec<String>,
}

impl CaptchaConfig {
    pub fn from_settings(settings: &HashMap<String, String>) -> Self {
        let get = |k: &str| settings.get(k).cloned().unwrap_or_default();
        let provider = match get("captcha_provider").as_str() {
            "recaptcha" => "recaptcha",
            "hcaptcha" => "hcaptcha",
            _ => "custom",
        }
        .to_string();
        let (site_key, secret_key) = match provider.as_str() {
            "recaptcha" => (get("recaptcha_site_key"), get("recaptcha_secret_key")),
            "hcaptcha" => (get("hcaptcha_site_key"), get("hcaptcha_secret_key")),
            _ => (String::new(), String::new()),
        };
        CaptchaConfig {
            enabled: is_truthy(&get("captcha_enabled")),
            provider,
            site_key,
            secret_key,
            protected_forms: get("captcha_protected_forms")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn protects(&self, form: &str) -> bool {
        self.enabled && self.protected_forms.iter().any(|f| f == form)
    }
}

// ── Built-in math challenge ──

pub struct MathChallenge {
    pub question: String,
    pub answer: i64,
}

/// Addition or subtraction of two numbers in 1..=10; subtraction never goes negative.
pub fn generate_math_challenge() -> MathChallenge {
    let mut rng = rand::thread_rng();
    let a: i64 = rng.gen_range(1..=10);
    let b: i64 = rng.gen_range(1..=10);
    if rng.gen_bool(0.5) {
        MathChallenge { question: format!("{} + {}", a, b), answer: a + b }
    } else {
        let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
        MathChallenge { question: format!("{} - {}", hi, lo), answer: hi - lo }
    }
}

/// Issue a challenge and remember its answer in a private cookie. Returns the question.
pub fn issue_math_challenge(cookies: &CookieJar<'_>) -> String {
    let challenge = generate_math_challenge();
    let value = format!("{}:{}", challenge.answer, chrono::Utc::now().timestamp());
    let mut cookie = Cookie::new(MATH_COOKIE, value);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_path("/");
    cookies.add_private(cookie);
    challenge.question
}

/// Check `answer` against a stored `"<answer>:<issued_at>"` value.
pub fn check_math_answer(stored: Option<&str>, answer: &str, now_ts: i64) -> bool {
    let Some(stored) = stored else { return false };
    let mut parts = stored.splitn(2, ':');
    let expected = parts.next().and_then(|s| s.parse::<i64>().ok());
    let issued = parts.next().and_then(|s| s.parse::<i64>().ok());
    match (expected, issued, answer.trim().parse::<i64>().ok()) {
        (Some(expected), Some(issued), Some(given)) => {
            now_ts - issued <= MATH_MAX_AGE_SECS && expected == given
        }
        _ => false,
    }
}

/// Verify the submitted response for the configured provider.
/// Math challenges are single use.
pub fn verify(
    config: &CaptchaConfig,
    cookies: &CookieJar<'_>,
    response: &str,
    remote_ip: Option<&str>,
) -> bool {
    match config.provider.as_str() {
        "recaptcha" => verify_remote(
            "https://www.google.com/recaptcha/api/siteverify",
            "reCAPTCHA",
            &config.secret_key,
            response,
            remote_ip,
        ),
        "hcaptcha" => verify_remote(
            "https://hcaptcha.com/siteverify",
            "hCaptcha",
            &config.secret_key,
            response,
            remote_ip,
        ),
        _ => {
            let stored = cookies.get_private(MATH_COOKIE).map(|c| c.value().to_string());
            cookies.remove_private(Cookie::from(MATH_COOKIE));
            check_math_answer(stored.as_deref(), response, chrono::Utc::now().timestamp())
        }
    }
}

fn verify_remote(url: &str, label: &str, secret: &str, token: &str, remote_ip: Option<&str>) -> bool {
    if secret.is_empty() || token.is_empty() {
        log::warn!("{} verification skipped: missing secret or token", label);
        return false;
    }

    let mut params = vec![("secret", secret), ("response", token)];
    if let Some(ip) = remote_ip {
        params.push(("remoteip", ip));
    }

    let result = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .and_then(|client| client.post(url).form(&params).send())
        .and_then(|resp| resp.json::<Value>());

    match result {
        Ok(json) => {
            let success = json.get("success").and_then(|v| v.as_bool()).unwrap_or(false);
            if !success {
                let errors = json
                    .get("error-codes")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default();
                log::warn!("{} verification failed: {}", label, errors);
                return false;
            }
            // reCAPTCHA v3 reports a score (0.0 = bot, 1.0 = human)
            match json.get("score").and_then(|v| v.as_f64()) {
                Some(score) if score < 0.5 => {
                    log::warn!("{} score too low: {}", label, score);
                    false
                }
                _ => true,
            }
        }
        Err(e) => {
            log::error!("{} request failed: {}", label, e);
            false
        }
    }
}
