use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::Client as DynamoClient;
use crud_dispatch::config::lambda::remaining_budget;
use crud_dispatch::utils::logger;
use crud_dispatch::utils::validation::Validate;
use crud_dispatch::{DispatchService, DynamoStore, InvocationLimiter, LambdaConfig};
use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use std::time::{SystemTime, UNIX_EPOCH};

async fn function_handler(
    service: &DispatchService<DynamoStore>,
    event: Request,
) -> Result<Response<Body>, Error> {
    let context = event.lambda_context();
    let budget = remaining_budget(context.deadline, now_ms());

    let reply = service
        .handle_with_deadline(event.body().as_ref(), budget)
        .await;

    let response = Response::builder()
        .status(reply.status)
        .header("content-type", "application/json")
        .body(Body::Text(reply.body))?;
    Ok(response)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    let config = LambdaConfig::from_env()?;
    config.validate()?;

    // 建立 AWS 配置與 DynamoDB 客戶端
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }
    let sdk_config = loader.load().await;

    let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
    if let Some(endpoint) = &config.dynamodb_endpoint {
        tracing::info!("Using DynamoDB endpoint override {}", endpoint);
        builder = builder.endpoint_url(endpoint);
    }
    let client = DynamoClient::from_conf(builder.build());

    let service = DispatchService::new(
        DynamoStore::new(client),
        InvocationLimiter::from_config(&config),
    );
    let service = &service;

    tracing::info!("Dispatcher Lambda ready");
    run(service_fn(move |event: Request| async move {
        function_handler(service, event).await
    }))
    .await
}
