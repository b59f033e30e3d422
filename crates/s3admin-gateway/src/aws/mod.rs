//! AWS SDK backed gateways.

mod cloudfront;
mod iam;
mod route53;
mod s3;

use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use chrono::{DateTime, Utc};
use s3admin_core::{AccountConfig, ApiError, CloudService, ErrorClassifier};
use tracing::info;

pub use cloudfront::AwsCdnGateway;
pub use iam::AwsIdentityGateway;
pub use route53::AwsDnsGateway;
pub use s3::AwsObjectGateway;

use crate::AccountGateways;
use crate::distribution::WebsiteDefaults;
use crate::policy::PolicyDefaults;

/// Build SDK clients for an account from its static credentials.
///
/// IAM, CloudFront and Route 53 are global services and ignore the endpoint
/// override, which only targets S3-compatible object storage.
pub async fn connect(account: &AccountConfig, classifier: ErrorClassifier) -> AccountGateways {
    let credentials = Credentials::new(&account.akid, &account.secret, None, None, "s3admin");
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_sdk_s3::config::Region::new(account.region.clone()))
        .credentials_provider(credentials)
        .load()
        .await;

    let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
    if let Some(endpoint) = &account.endpoint {
        s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
    }

    info!(
        region = %account.region,
        endpoint = account.endpoint.as_deref().unwrap_or("default"),
        "connected AWS gateways"
    );

    AccountGateways {
        object: Arc::new(AwsObjectGateway::new(
            aws_sdk_s3::Client::from_conf(s3_config.build()),
            classifier,
        )),
        identity: Arc::new(AwsIdentityGateway::new(
            aws_sdk_iam::Client::new(&sdk_config),
            classifier,
            PolicyDefaults::from_account(account),
        )),
        cdn: Arc::new(AwsCdnGateway::new(
            aws_sdk_cloudfront::Client::new(&sdk_config),
            classifier,
            WebsiteDefaults::from_account(account),
        )),
        dns: Arc::new(AwsDnsGateway::new(
            aws_sdk_route53::Client::new(&sdk_config),
            classifier,
        )),
    }
}

/// Translate an SDK failure into a classified [`ApiError`].
///
/// Service errors are classified by their code, or by HTTP status when the
/// response had no body. Everything else (dispatch, timeout, parse) is an
/// internal error.
pub(crate) fn sdk_error<E>(
    classifier: &ErrorClassifier,
    service: CloudService,
    context: &str,
    err: SdkError<E, HttpResponse>,
) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let classified = match &err {
        SdkError::ServiceError(service_err) => {
            let inner = service_err.err();
            Some(match inner.code() {
                Some(code) => classifier.classify(service, context, code, inner.message()),
                None => classifier.classify_status(context, service_err.raw().status().as_u16()),
            })
        }
        _ => None,
    };
    match classified {
        Some(api_err) => api_err.with_source(err),
        None => classifier.transport(context, err),
    }
}

/// Translate a request builder failure.
pub(crate) fn build_error(
    context: &str,
    err: impl std::error::Error + Send + Sync + 'static,
) -> ApiError {
    ApiError::internal(format!("{context}: invalid request: {err}")).with_source(err)
}

/// Convert an SDK timestamp.
pub(crate) fn to_chrono(dt: &aws_smithy_types::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}
