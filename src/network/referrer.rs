//! Referer 计算
//!
//! 按 W3C Referrer Policy 的八种策略，根据来源文档与目标地址计算请求应携带的 Referer。

use serde::{Deserialize, Serialize};
use url::Url;

use crate::utils::url::same_origin;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferrerPolicy {
    NoReferrer,
    NoReferrerWhenDowngrade,
    Origin,
    OriginWhenCrossOrigin,
    SameOrigin,
    StrictOrigin,
    #[default]
    StrictOriginWhenCrossOrigin,
    UnsafeUrl,
}

impl ReferrerPolicy {
    pub fn parse(value: &str) -> Option<ReferrerPolicy> {
        let policy = match value.trim().to_ascii_lowercase().as_str() {
            "no-referrer" => ReferrerPolicy::NoReferrer,
            "no-referrer-when-downgrade" => ReferrerPolicy::NoReferrerWhenDowngrade,
            "origin" => ReferrerPolicy::Origin,
            "origin-when-cross-origin" => ReferrerPolicy::OriginWhenCrossOrigin,
            "same-origin" => ReferrerPolicy::SameOrigin,
            "strict-origin" => ReferrerPolicy::StrictOrigin,
            "strict-origin-when-cross-origin" => ReferrerPolicy::StrictOriginWhenCrossOrigin,
            "unsafe-url" => ReferrerPolicy::UnsafeUrl,
            _ => return None,
        };
        Some(policy)
    }
}

enum Exposure {
    Full,
    OriginOnly,
    Nothing,
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// 计算从 `source` 请求 `target` 时应发送的 Referer
///
/// 只有来源与目标都是 http(s) 时才会发送；凭据与片段总是被去除。
pub fn compute_referrer(source: &Url, target: &Url, policy: ReferrerPolicy) -> Option<String> {
    if !is_http(source) || !is_http(target) {
        return None;
    }

    let same = same_origin(source, target);
    let downgrade = source.scheme() == "https" && target.scheme() != "https";

    let exposure = match policy {
        ReferrerPolicy::NoReferrer => Exposure::Nothing,
        ReferrerPolicy::Origin => Exposure::OriginOnly,
        ReferrerPolicy::UnsafeUrl => Exposure::Full,
        ReferrerPolicy::OriginWhenCrossOrigin if same => Exposure::Full,
        ReferrerPolicy::OriginWhenCrossOrigin => Exposure::OriginOnly,
        ReferrerPolicy::SameOrigin if same => Exposure::Full,
        ReferrerPolicy::SameOrigin => Exposure::Nothing,
        ReferrerPolicy::NoReferrerWhenDowngrade if downgrade => Exposure::Nothing,
        ReferrerPolicy::NoReferrerWhenDowngrade => Exposure::Full,
        ReferrerPolicy::StrictOrigin if downgrade => Exposure::Nothing,
        ReferrerPolicy::StrictOrigin => Exposure::OriginOnly,
        ReferrerPolicy::StrictOriginWhenCrossOrigin if downgrade => Exposure::Nothing,
        ReferrerPolicy::StrictOriginWhenCrossOrigin if same => Exposure::Full,
        ReferrerPolicy::StrictOriginWhenCrossOrigin => Exposure::OriginOnly,
    };

    let mut referrer = source.clone();
    let _ = referrer.set_username("");
    let _ = referrer.set_password(None);
    referrer.set_fragment(None);

    match exposure {
        Exposure::Full => Some(referrer.to_string()),
        Exposure::OriginOnly => {
            referrer.set_query(None);
            referrer.set_path("/");
            Some(referrer.to_string())
        }
        Exposure::Nothing => None,
    }
}
