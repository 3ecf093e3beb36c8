#![allow(dead_code)]

use hickory_resolver::proto::op::{Message, Query};
use hickory_resolver::proto::rr::rdata::{A, AAAA};
use hickory_resolver::proto::rr::{Name, RData, Record, RecordType};
use relay_dns::cache::RecordCache;
use relay_dns::clock::Clock;
use relay_dns::error::ResolveError;
use relay_dns::logger::QueryLogger;
use relay_dns::resolver::{DnsResolver, TtlSelection, UpstreamResolver};
use relay_dns::server::{reply_skeleton, ReplyHandle, Request, Worker};
use relay_dns::stats::StatsCollector;
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Upstream stand-in: fixed answers per name, counts every exchange.
#[derive(Default)]
pub struct MockResolver {
    answers: HashMap<String, (Vec<IpAddr>, u32)>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<(String, RecordType)>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(mut self, name: &str, addresses: &[&str], ttl: u32) -> Self {
        let addresses = addresses.iter().map(|s| s.parse().unwrap()).collect();
        self.answers.insert(name.to_string(), (addresses, ttl));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DnsResolver for MockResolver {
    async fn resolve(
        &self,
        name: &str,
        query_type: RecordType,
    ) -> Result<(Vec<Record>, String), ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((name.to_string(), query_type));

        if name.starts_with("panic.") {
            panic!("mock upstream exploded for {}", name);
        }
        if name.starts_with("down.") {
            return Err(ResolveError::Transport("connection refused".into()));
        }

        let owner = Name::from_ascii(name).unwrap();
        let records = match self.answers.get(name) {
            Some((addresses, ttl)) => addresses
                .iter()
                .map(|ip| {
                    let rdata = match ip {
                        IpAddr::V4(v4) => RData::A(A(*v4)),
                        IpAddr::V6(v6) => RData::AAAA(AAAA(*v6)),
                    };
                    Record::from_rdata(owner.clone(), *ttl, rdata)
                })
                .collect(),
            None => Vec::new(),
        };
        Ok((records, "mock".to_string()))
    }
}

/// Reply handle that forwards every sent message into a channel.
pub struct ChannelReply {
    tx: mpsc::UnboundedSender<Message>,
}

#[async_trait::async_trait]
impl ReplyHandle for ChannelReply {
    fn peer(&self) -> SocketAddr {
        "192.0.2.53:40000".parse().unwrap()
    }

    async fn send(&self, message: &Message) -> io::Result<()> {
        self.tx
            .send(message.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "receiver gone"))
    }
}

pub fn reply_channel() -> (
    impl Fn() -> Box<dyn ReplyHandle>,
    mpsc::UnboundedReceiver<Message>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let factory = move || Box::new(ChannelReply { tx: tx.clone() }) as Box<dyn ReplyHandle>;
    (factory, rx)
}

pub fn query_message(name: &str, record_type: RecordType, id: u16) -> Message {
    let mut msg = Message::new();
    msg.set_id(id).set_recursion_desired(true);
    msg.add_query(Query::query(Name::from_ascii(name).unwrap(), record_type));
    msg
}

pub fn request(reply: Box<dyn ReplyHandle>, name: &str, record_type: RecordType) -> Request {
    Request::new(reply, reply_skeleton(&query_message(name, record_type, 7)))
}

pub struct Harness {
    pub mock: Arc<MockResolver>,
    pub cache: RecordCache,
    pub stats: Arc<StatsCollector>,
    pub worker: Arc<Worker>,
}

pub fn harness(mock: MockResolver, clock: Arc<dyn Clock>) -> Harness {
    let mock = Arc::new(mock);
    let cache = RecordCache::new();
    let stats = StatsCollector::new(60);
    let logger = QueryLogger::with_sinks(Vec::new());
    let resolver = UpstreamResolver::new(mock.clone(), TtlSelection::Last);
    let worker = Arc::new(Worker::new(
        resolver,
        cache.clone(),
        clock,
        60,
        stats.clone(),
        logger,
    ));
    Harness {
        mock,
        cache,
        stats,
        worker,
    }
}

pub fn answer_ips(message: &Message) -> Vec<IpAddr> {
    message
        .answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .collect()
}
