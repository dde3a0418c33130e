/// Metrics guide shown by the `help` command.
pub const METRICS_GUIDE: &str = "\
Metrics guide
  Basis%        (mark - index) / index x 100
  TWAP15%       average of per-minute basis over the last 15 minutes
  Funding 1h%   per-hour funding rate; Daily Est% = funding 1h x 24
  Dom%          fut_vol24 / (fut_vol24 + spot_vol24_agg) x 100
  ΔOI 1h        OI now - OI one hour ago (USDT)
  OB Imb        sum of bid qty / sum of ask qty within 2% of mid
  SRS           Squeeze Risk Score 0-100; higher = greater squeeze risk
  Light         RED: DO NOT SHORT, YELLOW: BASIS-ONLY, GREEN: SHORT WINDOW

Commands
  add SYM       add a symbol to the watchlist
  rm SYM        remove a symbol from the watchlist
  open SYM      charts for one symbol; `back` returns to the tiles
  contracts     list addable contracts (`contracts spot` includes spot-listed)
  refresh       re-fetch the watchlist now
  metrics       poll telemetry (requires the `metrics` feature)
  quit          exit
";
