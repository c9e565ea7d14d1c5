//! 接收端的在途请求记录
//!
//! 每个入站命令 ID 对应一条记录：首次到达时创建，`wait` 时累加计数，
//! `complete` 或检测到过期时删除。
//!
use courier_core::{CommandOptions, TransportSettings, WaitDelay};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub wait_count: u32,
    pub wait_max_count: u32,
    pub wait_delay: WaitDelay,
    /// 等待重试的总预算
    pub wait_timeout: Duration,
    /// 绝对截止时间
    pub expired_at: Instant,
    pub is_need_reply: bool,
}

impl CommandRequest {
    pub fn new(options: &CommandOptions, settings: &TransportSettings, is_need_reply: bool) -> Self {
        Self {
            wait_count: 0,
            wait_max_count: options.wait_max_count(settings),
            wait_delay: options.wait_delay(settings),
            wait_timeout: options.wait_timeout(settings),
            expired_at: Instant::now() + options.timeout(settings),
            is_need_reply,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() > self.expired_at
    }

    /// 次数上限或时间预算任一耗尽即视为超出
    pub fn is_wait_exceeded(&self) -> bool {
        if self.wait_count >= self.wait_max_count {
            return true;
        }
        let waited = u128::from(self.wait_count) * u128::from(self.wait_delay.as_millis());
        waited >= self.wait_timeout.as_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(options: CommandOptions) -> CommandRequest {
        CommandRequest::new(&options, &TransportSettings::default(), true)
    }

    #[test]
    fn count_cap_triggers_first() {
        let mut item = request(
            CommandOptions::builder()
                .wait_max_count(3)
                .wait_delay(WaitDelay::ExtraFast)
                .build(),
        );
        for _ in 0..3 {
            assert!(!item.is_wait_exceeded());
            item.wait_count += 1;
        }
        assert!(item.is_wait_exceeded());
    }

    #[test]
    fn time_budget_triggers_first() {
        let mut item = request(
            CommandOptions::builder()
                .wait_max_count(100)
                .wait_delay(WaitDelay::Fast)
                .wait_timeout(2_500)
                .build(),
        );
        item.wait_count = 2;
        assert!(!item.is_wait_exceeded());
        item.wait_count = 3;
        assert!(item.is_wait_exceeded());
    }

    #[tokio::test(start_paused = true)]
    async fn expires_after_timeout() {
        let item = request(CommandOptions::builder().timeout(1_000).build());
        assert!(!item.is_expired());
        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert!(!item.is_expired());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(item.is_expired());
    }
}
