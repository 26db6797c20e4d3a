//! Shared fixtures for the pipeline tests: an in-memory catalog site and
//! configuration pointing a harvest at a temporary output root.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use miniface_harvester_lib::application::HarvestService;
use miniface_harvester_lib::infrastructure::{
    DdsCodec, HarvestConfig, HttpResponse, HttpTransport, PesmasterParser, TransportError,
};

pub const EDITION: &str = "https://www.pesmaster.com/efootball-2022/";
pub const LEAGUE: &str = "https://www.pesmaster.com/premier-league/efootball-2022/league/17/";
pub const TEAM: &str = "https://www.pesmaster.com/arsenal/efootball-2022/team/1/";
pub const FEED: &str = "https://www.pesmaster.com/efootball-2022/player/featured/";
pub const SON: &str = "https://www.pesmaster.com/son/efootball-2022/player/52781121579063/";
pub const GHOST: &str = "https://www.pesmaster.com/ghost/efootball-2022/player/99/";
pub const PORTRAIT: &str =
    "https://www.pesmaster.com/efootball-2022/graphics/players/Variation2022/52781121579063_.png";
pub const PORTRAIT_HUB23: &str = "https://efootballhub.net/images/efootball23/players/52781121579063_.png";
pub const PORTRAIT_HUB24: &str = "https://efootballhub.net/images/efootball24/players/52781121579063_.png";
pub const BACKGROUND: &str =
    "https://www.pesmaster.com/efootball-2022/graphics/players/Variation2022/event_b02.png";
pub const BACKGROUND_HUB23: &str = "https://efootballhub.net/images/efootball23/players/event_b02.png";
pub const BACKGROUND_HUB24: &str = "https://efootballhub.net/images/efootball24/players/event_b02.png";

pub const SON_KEY: &str = "43063";
pub const GHOST_KEY: &str = "99";

#[derive(Clone)]
pub enum Page {
    Ok(Vec<u8>),
    Redirected(String, Vec<u8>),
    Status(u16),
    Unreachable,
}

/// In-memory site: every URL not served answers 404
#[derive(Default)]
pub struct MockSite {
    pages: Mutex<HashMap<String, Page>>,
    log: Mutex<Vec<String>>,
}

impl MockSite {
    pub fn serve(&self, url: &str, page: Page) {
        self.pages.lock().unwrap().insert(url.to_string(), page);
    }

    pub fn hits(&self, url: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn reset_log(&self) {
        self.log.lock().unwrap().clear();
    }
}

#[async_trait]
impl HttpTransport for MockSite {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, TransportError> {
        self.log.lock().unwrap().push(url.to_string());
        let page = self.pages.lock().unwrap().get(url).cloned();
        match page {
            Some(Page::Ok(body)) => Ok(HttpResponse { status: 200, body, final_url: url.to_string() }),
            Some(Page::Redirected(final_url, body)) => Ok(HttpResponse { status: 200, body, final_url }),
            Some(Page::Status(status)) => Ok(HttpResponse { status, body: Vec::new(), final_url: url.to_string() }),
            Some(Page::Unreachable) => Err(TransportError::Connection("connection refused".into())),
            None => Ok(HttpResponse { status: 404, body: Vec::new(), final_url: url.to_string() }),
        }
    }
}

pub fn png(width: u32, height: u32, colour: [u8; 4]) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(colour)));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn edition_page() -> Vec<u8> {
    br#"<!DOCTYPE html><html><body>
        <div class="team-block-container"><a href="/efootball-2022/player/featured/">Featured</a></div>
        <div class="team-block-container">
          <div class="team-block"><a href="/premier-league/efootball-2022/league/17/"><span class="team-block-name">Premier League</span></a></div>
        </div>
    </body></html>"#
        .to_vec()
}

pub fn league_page() -> Vec<u8> {
    br#"<!DOCTYPE html><html><body>
        <div class="team-block-container">
          <div class="team-block"><a href="/arsenal/efootball-2022/team/1/">Arsenal</a></div>
        </div>
    </body></html>"#
        .to_vec()
}

pub fn player_list_page() -> Vec<u8> {
    br#"<!DOCTYPE html><html><body>
        <div class="player-card-container">
          <a href="/son/efootball-2022/player/52781121579063/">Son</a>
          <a href="/ghost/efootball-2022/player/99/">Ghost</a>
        </div>
    </body></html>"#
        .to_vec()
}

pub fn son_page() -> Vec<u8> {
    br#"<!DOCTYPE html><html><body>
        <div class="player-card-container">
          <figure class="player-card efootball-2022">
            <img data-src="/efootball-2022/graphics/teamlogos/e_000045_w.png">
            <img data-src="/efootball-2022/graphics/players/Variation2022/52781121579063_.png">
            <img data-src="/efootball-2022/graphics/players/Variation2022/event_b02.png">
          </figure>
        </div>
    </body></html>"#
        .to_vec()
}

/// Catalog with one league, one team and two players; only Son has a card
pub fn catalog_site() -> Arc<MockSite> {
    let site = Arc::new(MockSite::default());
    site.serve(EDITION, Page::Ok(edition_page()));
    site.serve(LEAGUE, Page::Ok(league_page()));
    site.serve(TEAM, Page::Ok(player_list_page()));
    site.serve(SON, Page::Ok(son_page()));
    site.serve(PORTRAIT, Page::Ok(png(16, 16, [200, 10, 10, 255])));
    site.serve(BACKGROUND, Page::Ok(png(24, 24, [10, 10, 200, 255])));
    site
}

pub fn config(root: &Path) -> HarvestConfig {
    let mut config = HarvestConfig::default();
    config.output.root_dir = root.to_path_buf();
    config.network.request_delay_ms = 0;
    config.network.retry_base_delay_ms = 0;
    config.network.max_retries = 2;
    config.network.request_timeout_secs = 5;
    config.workers.teams = 2;
    config.workers.players = 2;
    config.workers.images = 2;
    config
}

pub fn service(root: &Path, site: &Arc<MockSite>) -> HarvestService {
    let config = config(root);
    let parser = PesmasterParser::new(&config.catalog.base_url, config.catalog.league_block_index).unwrap();
    HarvestService::with_adapters(config, site.clone(), Arc::new(parser), Arc::new(DdsCodec)).unwrap()
}
