//! The upstream exchange against local sockets standing in for real servers.

use hickory_resolver::proto::op::{Message, MessageType};
use hickory_resolver::proto::rr::rdata::{A, CNAME};
use hickory_resolver::proto::rr::{Name, RData, Record, RecordType};
use relay_dns::config::Config;
use relay_dns::error::ResolveError;
use relay_dns::resolver::{create_resolver, UpstreamResolver};
use relay_dns::stats::StatsCollector;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

fn resolver_for(upstream: String, stats: Arc<StatsCollector>) -> UpstreamResolver {
    let mut config = Config::default();
    config.upstream_servers = vec![upstream];
    config.upstream_timeout_ms = 200;
    create_resolver(&config, stats).unwrap()
}

fn answer(query: &Message, answers: Vec<Record>) -> Message {
    let mut reply = Message::new();
    reply
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_recursion_desired(query.recursion_desired())
        .set_recursion_available(true);
    reply.add_queries(query.queries().to_vec());
    reply.add_answers(answers);
    reply
}

/// Answers every datagram with the records `answers` produces for its question.
async fn fake_udp_upstream<F>(answers: F) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn(&Name) -> Vec<Record> + Send + 'static,
{
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let received = Arc::new(AtomicUsize::new(0));
    let counter = received.clone();
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
            let query = Message::from_vec(&buf[..len]).unwrap();
            let name = query.queries()[0].name().clone();
            let reply = answer(&query, answers(&name));
            socket.send_to(&reply.to_vec().unwrap(), peer).await.unwrap();
        }
    });
    (addr, received)
}

#[tokio::test]
async fn test_localhost_is_sent_upstream_not_answered_locally() {
    // Never replies.
    let black_hole = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let stats = StatsCollector::new(10);
    let resolver = resolver_for(
        format!("udp://{}", black_hole.local_addr().unwrap()),
        stats.clone(),
    );

    let result = resolver.resolve("localhost.", RecordType::A).await;
    assert!(
        matches!(result, Err(ResolveError::Transport(_))),
        "expected a timeout, got {:?}",
        result
    );

    let mut buf = vec![0u8; 4096];
    let (len, _) = tokio::time::timeout(Duration::from_secs(1), black_hole.recv_from(&mut buf))
        .await
        .expect("the query should have reached the upstream")
        .unwrap();
    let query = Message::from_vec(&buf[..len]).unwrap();
    assert_eq!(query.queries().len(), 1);
    assert_eq!(query.queries()[0].name().to_string(), "localhost.");
    assert_eq!(query.queries()[0].query_type(), RecordType::A);
    assert!(query.recursion_desired());

    // Exactly one datagram per resolution; no retries.
    assert!(black_hole.try_recv_from(&mut buf).is_err());
    assert_eq!(stats.snapshot().upstream_queries, 1);
}

#[tokio::test]
async fn test_hosts_file_names_are_sent_upstream() {
    let black_hole = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let stats = StatsCollector::new(10);
    let resolver = resolver_for(black_hole.local_addr().unwrap().to_string(), stats.clone());

    for name in ["localhost.localdomain.", "ip6-localhost."] {
        let result = resolver.resolve(name, RecordType::AAAA).await;
        assert!(matches!(result, Err(ResolveError::Transport(_))), "{}: {:?}", name, result);
    }

    let mut buf = vec![0u8; 4096];
    for _ in 0..2 {
        tokio::time::timeout(Duration::from_secs(1), black_hole.recv_from(&mut buf))
            .await
            .expect("each query should reach the upstream")
            .unwrap();
    }
    assert!(black_hole.try_recv_from(&mut buf).is_err());
    assert_eq!(stats.snapshot().upstream_queries, 2);
}

#[tokio::test]
async fn test_answer_ttl_comes_from_the_wire() {
    let (addr, received) = fake_udp_upstream(|name| {
        vec![Record::from_rdata(
            name.clone(),
            120,
            RData::A(A(Ipv4Addr::new(192, 0, 2, 7))),
        )]
    })
    .await;
    let stats = StatsCollector::new(10);
    let upstream = format!("udp://{}", addr);
    let resolver = resolver_for(upstream.clone(), stats.clone());

    let resolved = resolver.resolve("example.test.", RecordType::A).await.unwrap();

    assert_eq!(resolved.addresses, vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7))]);
    assert_eq!(resolved.ttl, 120);
    assert_eq!(resolved.upstream, upstream);
    assert_eq!(received.load(Ordering::SeqCst), 1);
    assert_eq!(stats.snapshot().upstream_queries, 1);
}

#[tokio::test]
async fn test_cname_only_answer_is_not_chased() {
    let (addr, received) = fake_udp_upstream(|name| {
        let target = Name::from_ascii("target.example.test.").unwrap();
        vec![Record::from_rdata(name.clone(), 300, RData::CNAME(CNAME(target)))]
    })
    .await;
    let stats = StatsCollector::new(10);
    let resolver = resolver_for(addr.to_string(), stats.clone());

    let resolved = resolver.resolve("alias.example.test.", RecordType::A).await.unwrap();

    assert!(resolved.addresses.is_empty());
    assert_eq!(resolved.ttl, 0);
    assert_eq!(received.load(Ordering::SeqCst), 1);
    assert_eq!(stats.snapshot().upstream_queries, 1);
}

#[tokio::test]
async fn test_empty_answer_is_no_records() {
    let (addr, received) = fake_udp_upstream(|_| Vec::new()).await;
    let resolver = resolver_for(addr.to_string(), StatsCollector::new(10));

    let result = resolver.resolve("missing.example.test.", RecordType::A).await;

    assert_eq!(
        result,
        Err(ResolveError::NoRecords("missing.example.test.".to_string()))
    );
    assert_eq!(received.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_tcp_upstream_uses_length_prefix() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut prefix = [0u8; 2];
        stream.read_exact(&mut prefix).await.unwrap();
        let mut body = vec![0u8; u16::from_be_bytes(prefix) as usize];
        stream.read_exact(&mut body).await.unwrap();

        let query = Message::from_vec(&body).unwrap();
        let name = query.queries()[0].name().clone();
        let reply = answer(
            &query,
            vec![Record::from_rdata(name, 45, RData::A(A(Ipv4Addr::new(203, 0, 113, 9))))],
        )
        .to_vec()
        .unwrap();
        stream
            .write_all(&(reply.len() as u16).to_be_bytes())
            .await
            .unwrap();
        stream.write_all(&reply).await.unwrap();
    });

    let resolver = resolver_for(format!("tcp://{}", addr), StatsCollector::new(10));
    let resolved = resolver.resolve("tcp.example.test.", RecordType::A).await.unwrap();

    assert_eq!(resolved.addresses, vec![IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9))]);
    assert_eq!(resolved.ttl, 45);
}
