// src/client.rs

use crate::{config::AppConfig, error::*};
use http::Extensions;
use log::{debug, warn};
use reqwest::{IntoUrl, Request, Response, redirect};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use std::time::Instant;

/// 记录每个请求及其响应状态的中间件
struct RequestLogger;

#[async_trait::async_trait]
impl Middleware for RequestLogger {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let method = req.method().clone();
        let url = req.url().clone();
        let started = Instant::now();
        debug!("--> {} {}", method, url);
        let result = next.run(req, extensions).await;
        match &result {
            Ok(res) => debug!(
                "<-- {} {} ({}ms)",
                res.status(),
                url,
                started.elapsed().as_millis()
            ),
            Err(e) => warn!("<-- {} {} 失败: {}", method, url, e),
        }
        result
    }
}

#[derive(Clone)]
pub struct HttpClient {
    pub client: ClientWithMiddleware,
}

impl HttpClient {
    /// 构建下载用的客户端。自动重定向被关闭，由 Fetcher 自行跟随；
    /// 整体超时同样由 Fetcher 控制，这里只设置连接超时。
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .redirect(redirect::Policy::none())
            .build()?;
        let client = ClientBuilder::new(inner).with(RequestLogger).build();
        Ok(Self { client })
    }

    pub async fn get<T: IntoUrl>(&self, url: T) -> AppResult<Response> {
        Ok(self.client.get(url).send().await?)
    }
}
