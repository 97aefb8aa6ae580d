// ==========================================
// 成本情报系统 - BOM 拆解协作方接口
// ==========================================
// 说明: 自由文本 → 物料清单的拆解由外部文本生成服务完成,
//       本系统只定义接缝; 其输出视为不可信输入,由估算管道过滤
// ==========================================

use crate::domain::estimate::BomLine;
use async_trait::async_trait;

/// BOM 拆解协作方
///
/// # 约定
/// - 每次估算至多调用一次
/// - 返回行可能包含空物料名/非正数量,调用方负责过滤
#[async_trait]
pub trait BomDissector: Send + Sync {
    async fn dissect(
        &self,
        description: &str,
        category: Option<&str>,
    ) -> anyhow::Result<Vec<BomLine>>;
}

// ==========================================
// PassthroughDissector - 直通降级实现
// ==========================================
/// 未接入外部拆解服务时的降级实现:
/// 整段描述作为单行 BOM（数量 1,单位 piece）
pub struct PassthroughDissector;

#[async_trait]
impl BomDissector for PassthroughDissector {
    async fn dissect(
        &self,
        description: &str,
        _category: Option<&str>,
    ) -> anyhow::Result<Vec<BomLine>> {
        Ok(vec![BomLine {
            material_name: description.to_string(),
            quantity: 1.0,
            unit: "piece".to_string(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passthrough_single_line() {
        let lines = PassthroughDissector
            .dissect("6x4m fabric banner stand", None)
            .await
            .unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].material_name, "6x4m fabric banner stand");
        assert_eq!(lines[0].quantity, 1.0);
        assert_eq!(lines[0].unit, "piece");
    }
}
