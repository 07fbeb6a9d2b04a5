use candle_feed_core::errors::Error;
use candle_feed_core::model::Candlestick;
use serde::Deserialize;

/// v5 kline envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitKlineResponse {
    pub ret_code: i64,
    pub ret_msg: String,
    pub result: Option<BybitKlineResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BybitKlineResult {
    pub list: Vec<BybitKlineRow>,
}

/// One kline row: `[startTimeMs, open, high, low, close, volume, turnover]`,
/// every field a string. Rows arrive newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct BybitKlineRow(
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
);

impl BybitKlineRow {
    pub fn to_candlestick(&self) -> Result<Candlestick, Error> {
        let start_ms: i64 = self.0.parse().map_err(|_| Error::InvalidJSONResponse {
            detail: format!("non-numeric kline start time: {}", self.0),
        })?;
        parse_field(&self.5, "volume")?;
        Ok(Candlestick {
            timestamp: start_ms.div_euclid(1000),
            open: parse_field(&self.1, "open")?,
            high: parse_field(&self.2, "high")?,
            low: parse_field(&self.3, "low")?,
            close: parse_field(&self.4, "close")?,
        })
    }
}

fn parse_field(raw: &str, field: &str) -> Result<f64, Error> {
    raw.parse::<f64>().map_err(|_| Error::InvalidJSONResponse {
        detail: format!("non-numeric {field} field: {raw}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_v5_envelope() {
        let raw = r#"{
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "list": [["1657378800000","21585.1","21639.8","21524.5","21538.7","1500","32000000"]]
            }
        }"#;
        let response: BybitKlineResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.ret_code, 0);
        let candle = response.result.unwrap().list[0].to_candlestick().unwrap();
        assert_eq!(candle.timestamp, 1657378800);
        assert_eq!(candle.high, 21639.8);
    }

    #[test]
    fn rejects_non_numeric_rows() {
        let row = BybitKlineRow(
            "nope".into(),
            "1".into(),
            "2".into(),
            "0.5".into(),
            "1.5".into(),
            "10".into(),
            "20".into(),
        );
        assert!(matches!(
            row.to_candlestick(),
            Err(Error::InvalidJSONResponse { .. })
        ));
    }
}
